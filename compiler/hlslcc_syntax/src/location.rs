//! Source attribution for tokens and syntax nodes.
//!
//! HLSL handed to the cross-compiler is usually preprocessed, so the physical
//! line of a token rarely matches the file the author edited. `#line`
//! directives re-anchor the scanner; every token records the file and line
//! that were current when it was produced.

use std::fmt;

/// Index into a [`SourceFiles`] table.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
#[repr(transparent)]
pub struct FileId(u32);

impl FileId {
    /// The file named when lexing started.
    pub const PRIMARY: FileId = FileId(0);

    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Line/file attribution of a token or node.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
pub struct SourceLocation {
    pub file: FileId,
    /// 1-based line number, as adjusted by `#line`.
    pub line: u32,
}

impl SourceLocation {
    pub const fn new(file: FileId, line: u32) -> Self {
        SourceLocation { file, line }
    }
}

/// File names seen while lexing one translation unit.
///
/// Entry 0 is always the filename hint passed to the lexer.
#[derive(Clone, Debug)]
pub struct SourceFiles {
    names: Vec<Box<str>>,
}

impl SourceFiles {
    pub fn new(primary: &str) -> Self {
        SourceFiles {
            names: vec![primary.into()],
        }
    }

    /// Return the id for `name`, registering it on first use.
    #[expect(
        clippy::cast_possible_truncation,
        reason = "a translation unit never names 2^32 files"
    )]
    pub fn intern(&mut self, name: &str) -> FileId {
        if let Some(pos) = self.names.iter().position(|n| &**n == name) {
            return FileId(pos as u32);
        }
        self.names.push(name.into());
        FileId((self.names.len() - 1) as u32)
    }

    pub fn name(&self, id: FileId) -> &str {
        self.names.get(id.index()).map_or("", |n| n)
    }

    /// Render a location as `file(line)`, the form shader tooling expects.
    pub fn describe(&self, loc: SourceLocation) -> String {
        format!("{}({})", self.name(loc.file), loc.line)
    }
}

impl Default for SourceFiles {
    fn default() -> Self {
        SourceFiles::new("")
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}", self.line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primary_file_is_id_zero() {
        let mut files = SourceFiles::new("Shader.usf");
        assert_eq!(files.intern("Shader.usf"), FileId::PRIMARY);
        let other = files.intern("Common.ush");
        assert_eq!(other.index(), 1);
        assert_eq!(files.intern("Common.ush"), other);
        assert_eq!(files.describe(SourceLocation::new(other, 12)), "Common.ush(12)");
    }
}
