//! ESC/POS command builder
//!
//! Provides a fluent API for building ESC/POS print data. Text is
//! transcoded to the configured codepage as it is appended; widths are
//! tracked by a [`LineBudget`].

use crate::encoding::Codepage;
use crate::layout::{LineBudget, PaperProfile};
use crate::raster::RasterBlock;
use std::ops::Deref;
use std::sync::Arc;

const ESC: u8 = 0x1B;
const GS: u8 = 0x1D;
const LF: u8 = 0x0A;

/// One printer primitive inside a [`CommandBuffer`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Raw escape sequence
    Command(Vec<u8>),
    /// Text already encoded in the buffer's codepage
    Text(Vec<u8>),
    /// Bitmap emitted as `GS v 0`
    Raster(Arc<RasterBlock>),
}

/// Ordered, append-only sequence of printer primitives
#[derive(Debug, Clone, Default)]
pub struct CommandBuffer {
    segments: Vec<Segment>,
}

impl CommandBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, segment: Segment) {
        self.segments.push(segment);
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Encoded text segments, in order
    pub fn texts(&self) -> impl Iterator<Item = &[u8]> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Text(t) => Some(t.as_slice()),
            _ => None,
        })
    }

    /// Raster blocks, in order
    pub fn rasters(&self) -> impl Iterator<Item = &RasterBlock> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Raster(r) => Some(r.as_ref()),
            _ => None,
        })
    }

    /// Concatenate all segments into the final byte stream
    pub fn finalize(self) -> PrintData {
        let len = self
            .segments
            .iter()
            .map(|s| match s {
                Segment::Command(b) | Segment::Text(b) => b.len(),
                Segment::Raster(r) => 8 + r.data().len(),
            })
            .sum();
        let mut out = Vec::with_capacity(len);
        for segment in &self.segments {
            match segment {
                Segment::Command(b) | Segment::Text(b) => out.extend_from_slice(b),
                Segment::Raster(r) => r.write_command(&mut out),
            }
        }
        PrintData(out.into())
    }
}

/// Finalized, immutable ESC/POS byte stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrintData(Arc<[u8]>);

impl PrintData {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl Deref for PrintData {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.0
    }
}

impl AsRef<[u8]> for PrintData {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<Vec<u8>> for PrintData {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes.into())
    }
}

/// ESC/POS command builder
///
/// Builds a [`CommandBuffer`] for thermal printers. The buffer starts
/// with `ESC @` followed by the codepage selection.
pub struct EscPosBuilder {
    buf: CommandBuffer,
    budget: LineBudget,
}

impl EscPosBuilder {
    /// Create a new builder for a paper profile and codepage
    pub fn new(profile: PaperProfile, codepage: Codepage) -> Self {
        let mut b = Self {
            buf: CommandBuffer::new(),
            budget: LineBudget::new(profile, codepage),
        };
        b.reset();
        b
    }

    /// Current width budget
    pub fn budget(&self) -> &LineBudget {
        &self.budget
    }

    /// Characters per line in the current size
    pub fn width(&self) -> usize {
        self.budget.columns()
    }

    fn command(&mut self, bytes: &[u8]) -> &mut Self {
        self.buf.push(Segment::Command(bytes.to_vec()));
        self
    }

    // === Text Output ===

    /// Write text (codepage encoded)
    pub fn text(&mut self, s: &str) -> &mut Self {
        if !s.is_empty() {
            let encoded = self.budget.codepage().encode(s);
            self.buf.push(Segment::Text(encoded));
        }
        self
    }

    /// Write text followed by newline
    pub fn line(&mut self, s: &str) -> &mut Self {
        let mut encoded = self.budget.codepage().encode(s);
        encoded.push(LF);
        self.buf.push(Segment::Text(encoded));
        self
    }

    /// Write empty line
    pub fn newline(&mut self) -> &mut Self {
        self.command(&[LF])
    }

    /// Print and feed n lines (ESC d n)
    pub fn feed(&mut self, lines: u8) -> &mut Self {
        self.command(&[ESC, 0x64, lines])
    }

    // === Alignment ===

    /// Align text to center
    pub fn center(&mut self) -> &mut Self {
        self.command(&[ESC, 0x61, 0x01])
    }

    /// Align text to left (default)
    pub fn left(&mut self) -> &mut Self {
        self.command(&[ESC, 0x61, 0x00])
    }

    /// Align text to right
    pub fn right(&mut self) -> &mut Self {
        self.command(&[ESC, 0x61, 0x02])
    }

    // === Text Style ===

    /// Enable bold text
    pub fn bold(&mut self) -> &mut Self {
        self.command(&[ESC, 0x45, 0x01])
    }

    /// Disable bold text
    pub fn bold_off(&mut self) -> &mut Self {
        self.command(&[ESC, 0x45, 0x00])
    }

    /// Double width and height
    pub fn double_size(&mut self) -> &mut Self {
        self.budget.set_double_width(true);
        self.command(&[GS, 0x21, 0x11])
    }

    /// Double height only
    pub fn double_height(&mut self) -> &mut Self {
        self.budget.set_double_width(false);
        self.command(&[GS, 0x21, 0x01])
    }

    /// Double width only
    pub fn double_width(&mut self) -> &mut Self {
        self.budget.set_double_width(true);
        self.command(&[GS, 0x21, 0x10])
    }

    /// Reset to normal size
    pub fn reset_size(&mut self) -> &mut Self {
        self.budget.set_double_width(false);
        self.command(&[GS, 0x21, 0x00])
    }

    // === Separators ===

    /// Print a line of '=' characters
    pub fn sep_double(&mut self) -> &mut Self {
        let rule = self.budget.rule('=');
        self.line(&rule)
    }

    /// Print a line of '-' characters
    pub fn sep_single(&mut self) -> &mut Self {
        let rule = self.budget.rule('-');
        self.line(&rule)
    }

    // === Layout Helpers ===

    /// Move the print position to an absolute dot (ESC $ nL nH)
    pub fn absolute_position(&mut self, dot: u16) -> &mut Self {
        self.command(&[ESC, 0x24, dot as u8, (dot >> 8) as u8])
    }

    /// Print left and right text on the same line
    ///
    /// The right field ends at the printable edge. With absolute
    /// positioning the gap is a cursor move, otherwise spaces. The left
    /// field is truncated to keep one separating space.
    pub fn line_lr(&mut self, left: &str, right: &str) -> &mut Self {
        let pair = self.budget.fit_pair(left, right);

        if self.budget.profile().absolute_positioning {
            let dot = self.budget.right_aligned_dot(&pair.right);
            self.text(&pair.left);
            self.absolute_position(dot);
            self.line(&pair.right)
        } else {
            let left = self.budget.codepage().pad(&pair.left, pair.right_column, false);
            self.line(&format!("{}{}", left, pair.right))
        }
    }

    // === Graphics ===

    /// Print a raster image (GS v 0) followed by a line feed
    pub fn raster(&mut self, block: Arc<RasterBlock>) -> &mut Self {
        self.buf.push(Segment::Raster(block));
        self.newline()
    }

    // === Paper Control ===

    /// Cut paper (full cut)
    pub fn cut(&mut self) -> &mut Self {
        // GS V 0 - Full cut
        self.command(&[GS, 0x56, 0x00])
    }

    /// Reset printer to default state and reselect the codepage
    pub fn reset(&mut self) -> &mut Self {
        self.budget.set_double_width(false);
        let table = self.budget.codepage().escpos_table();
        // ESC @ - Initialize, ESC t n - Select character code table
        self.command(&[ESC, 0x40]);
        self.command(&[ESC, 0x74, table])
    }

    // === Build ===

    /// Finish building and return the segment buffer
    pub fn into_buffer(self) -> CommandBuffer {
        self.buf
    }

    /// Build the final byte stream
    pub fn build(self) -> PrintData {
        self.buf.finalize()
    }
}

impl Default for EscPosBuilder {
    fn default() -> Self {
        Self::new(PaperProfile::default(), Codepage::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contains(haystack: &[u8], needle: &[u8]) -> bool {
        haystack.windows(needle.len()).any(|w| w == needle)
    }

    #[test]
    fn test_builder_starts_with_reset_and_codepage() {
        let data = EscPosBuilder::default().build();
        assert_eq!(data.as_bytes(), &[0x1B, 0x40, 0x1B, 0x74, 16]);
    }

    #[test]
    fn test_text_is_transcoded() {
        let mut b = EscPosBuilder::new(PaperProfile::MM58, Codepage::Windows1252);
        b.center().bold().line("Peñalolén").bold_off();
        let data = b.build();
        assert!(contains(&data, &[b'P', b'e', 0xF1, b'a']));
        assert!(!contains(&data, "ñ".as_bytes()));
    }

    #[test]
    fn test_line_lr_absolute_position() {
        let mut b = EscPosBuilder::new(PaperProfile::MM80, Codepage::Windows1252);
        b.line_lr("Widget", "$ 2.000");
        let data = b.build();
        // 576 - 7 * 12 = 492 = 0x01EC
        assert!(contains(&data, b"Widget\x1B\x24\xEC\x01$ 2.000\n"));
    }

    #[test]
    fn test_line_lr_space_padding_same_column() {
        let profile = PaperProfile::MM58.with_absolute_positioning(false);
        let mut b = EscPosBuilder::new(profile, Codepage::Windows1252);
        b.line_lr("ab", "cd");
        let data = b.build();
        let expected = format!("ab{}cd\n", " ".repeat(28));
        assert!(contains(&data, expected.as_bytes()));
    }

    #[test]
    fn test_separators_follow_size() {
        let mut b = EscPosBuilder::new(PaperProfile::MM58, Codepage::Windows1252);
        b.sep_double();
        b.double_size();
        b.sep_single();
        b.reset_size();
        let buffer = b.into_buffer();
        let texts: Vec<&[u8]> = buffer.texts().collect();
        assert_eq!(texts[0].len(), 33);
        assert_eq!(texts[1].len(), 17);
    }

    #[test]
    fn test_raster_segment_finalizes_to_gs_v_0() {
        let block = Arc::new(RasterBlock::pack(8, 2, |_, _| true).unwrap());
        let mut b = EscPosBuilder::default();
        b.raster(block);
        let buffer = b.into_buffer();
        assert_eq!(buffer.rasters().count(), 1);
        let data = buffer.finalize();
        assert!(contains(
            &data,
            &[0x1D, 0x76, 0x30, 0x00, 1, 0, 2, 0, 0xFF, 0xFF, 0x0A]
        ));
    }

    #[test]
    fn test_cut_bytes() {
        let mut b = EscPosBuilder::default();
        b.feed(4).cut();
        let data = b.build();
        assert!(data.ends_with(&[0x1B, 0x64, 4, 0x1D, 0x56, 0x00]));
    }
}
