//! Byte cursor over the source text.
//!
//! Reading past the end yields `0`, which no scanning rule accepts, so the
//! scanner's dispatch needs no separate bounds checks.

#[derive(Clone, Copy, Debug)]
pub(crate) struct Cursor<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Cursor<'a> {
    pub(crate) fn new(src: &'a str) -> Self {
        Cursor { src, pos: 0 }
    }

    #[inline]
    pub(crate) fn current(&self) -> u8 {
        self.byte_at(self.pos)
    }

    #[inline]
    pub(crate) fn peek(&self) -> u8 {
        self.byte_at(self.pos + 1)
    }

    #[inline]
    pub(crate) fn peek2(&self) -> u8 {
        self.byte_at(self.pos + 2)
    }

    #[inline]
    fn byte_at(&self, pos: usize) -> u8 {
        self.src.as_bytes().get(pos).copied().unwrap_or(0)
    }

    #[inline]
    pub(crate) fn advance(&mut self) {
        self.pos += 1;
    }

    #[inline]
    pub(crate) fn advance_n(&mut self, n: usize) {
        self.pos += n;
    }

    #[inline]
    pub(crate) fn is_eof(&self) -> bool {
        self.pos >= self.src.len()
    }

    #[inline]
    pub(crate) fn pos(&self) -> usize {
        self.pos
    }

    /// Advance while `pred` holds for the current byte.
    pub(crate) fn eat_while(&mut self, pred: impl Fn(u8) -> bool) {
        while !self.is_eof() && pred(self.current()) {
            self.pos += 1;
        }
    }

    /// Skip to the next `\n` without consuming it.
    pub(crate) fn skip_to_newline(&mut self) {
        self.eat_while(|b| b != b'\n');
    }

    /// Text between `start` and the current position.
    ///
    /// Callers only slice runs of ASCII bytes, which are always on char
    /// boundaries.
    pub(crate) fn slice_from(&self, start: usize) -> &'a str {
        self.src.get(start..self.pos).unwrap_or("")
    }

    /// The full character at the current position, for anomaly reports.
    pub(crate) fn current_char(&self) -> Option<char> {
        self.src.get(self.pos..)?.chars().next()
    }

    pub(crate) fn rest(&self) -> &'a [u8] {
        self.src.as_bytes().get(self.pos..).unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_past_end_as_zero() {
        let mut cursor = Cursor::new("ab");
        assert_eq!(cursor.current(), b'a');
        assert_eq!(cursor.peek(), b'b');
        assert_eq!(cursor.peek2(), 0);
        cursor.advance_n(2);
        assert!(cursor.is_eof());
        assert_eq!(cursor.current(), 0);
    }

    #[test]
    fn eat_while_and_slice() {
        let mut cursor = Cursor::new("abc123 rest");
        cursor.eat_while(|b| b.is_ascii_alphanumeric());
        assert_eq!(cursor.slice_from(0), "abc123");
        assert_eq!(cursor.pos(), 6);
    }

    #[test]
    fn multibyte_char_is_reported_whole() {
        let cursor = Cursor::new("é");
        assert_eq!(cursor.current_char(), Some('é'));
    }
}
