use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Grid coordinates of one tile of the pairwise-distance matrix.
///
/// `row` selects the block of query subsequences, `col` the block of
/// candidate subsequences. In a self-join only tiles with `row <= col` are
/// ever computed; the lower triangle is the transpose of its mirror.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct TileId {
    pub row: usize,
    pub col: usize,
}

impl TileId {
    pub fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }

    /// Decode a tile from a storage key or a bare identifier.
    ///
    /// Only the last `/`-separated segment is considered and everything from
    /// its first `.` on is treated as an extension, so `runs/7/result_1_2.tar.xz`,
    /// `result_1_2.tar.xz` and `result_1_2` all decode to `(1, 2)`.
    /// The stem must be `<word>_<row>_<col>`, where `<word>` is a non-empty run
    /// of ASCII alphanumerics and underscores.
    pub fn from_key(key: &str) -> Result<Self, ParseTileIdError> {
        let err = |reason| ParseTileIdError {
            key: key.to_string(),
            reason,
        };

        let name = key.rsplit('/').next().unwrap_or(key);
        let stem = name.split('.').next().unwrap_or(name);

        let mut parts = stem.rsplitn(3, '_');
        let col = parts.next().ok_or_else(|| err("missing column"))?;
        let row = parts.next().ok_or_else(|| err("missing row"))?;
        let word = parts.next().ok_or_else(|| err("missing name prefix"))?;

        if word.is_empty() || !word.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_') {
            return Err(err("name prefix must be a non-empty word"));
        }

        Ok(Self {
            row: parse_coordinate(row).ok_or_else(|| err("row is not an unsigned integer"))?,
            col: parse_coordinate(col).ok_or_else(|| err("column is not an unsigned integer"))?,
        })
    }

    #[inline]
    pub fn is_diagonal(&self) -> bool {
        self.row == self.col
    }

    /// Whether the tile lies strictly below the diagonal.
    #[inline]
    pub fn is_lower(&self) -> bool {
        self.col < self.row
    }

    #[inline]
    pub fn transposed(&self) -> Self {
        Self {
            row: self.col,
            col: self.row,
        }
    }
}

fn parse_coordinate(s: &str) -> Option<usize> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

impl fmt::Display for TileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.row, self.col)
    }
}

impl FromStr for TileId {
    type Err = ParseTileIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_key(s)
    }
}

/// A tile identifier that does not follow the `<word>_<row>_<col>` convention.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid tile identifier `{key}`: {reason}")]
pub struct ParseTileIdError {
    pub key: String,
    pub reason: &'static str,
}

/// One half of a tile's partial result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Contribution {
    /// The tile's own column-range profile (`mpA` / `mpiA`).
    A,
    /// The transposed row-range profile (`B_mp` / `B_mpi`), self-join only.
    B,
}

impl fmt::Display for Contribution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Contribution::A => f.write_str("A"),
            Contribution::B => f.write_str("B"),
        }
    }
}

/// Which contributions a fetched tile must supply to the merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TileKind {
    A,
    B,
    Both,
}

impl TileKind {
    pub fn union(self, other: TileKind) -> TileKind {
        if self == other {
            self
        } else {
            TileKind::Both
        }
    }

    #[inline]
    pub fn has_a(self) -> bool {
        matches!(self, TileKind::A | TileKind::Both)
    }

    #[inline]
    pub fn has_b(self) -> bool {
        matches!(self, TileKind::B | TileKind::Both)
    }
}

/// Translation from tile-grid coordinates to the zero-based global index space.
///
/// Both fields are in element units (already multiplied by the tile height or
/// width), matching the offsets subtracted during the merge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CoordinateOrigin {
    pub true_start_row: usize,
    pub true_start_col: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bare_identifier() {
        assert_eq!(TileId::from_key("result_1_2").unwrap(), TileId::new(1, 2));
    }

    #[test]
    fn test_parse_storage_key_with_extension() {
        let id: TileId = "runs/42/result_10_3.tar.xz".parse().unwrap();
        assert_eq!(id, TileId::new(10, 3));
    }

    #[test]
    fn test_parse_word_with_underscores() {
        assert_eq!(
            TileId::from_key("partial_result_0_7.tgz").unwrap(),
            TileId::new(0, 7)
        );
    }

    #[test]
    fn test_parse_rejects_malformed() {
        for key in [
            "result_1",
            "result_a_2",
            "result_1_",
            "_1_2",
            "1_2",
            "result-x_1_2",
            "result_1_2x",
            "result_-1_2",
            "",
        ] {
            assert!(TileId::from_key(key).is_err(), "accepted `{key}`");
        }
    }

    #[test]
    fn test_parse_error_names_key() {
        let err = TileId::from_key("bogus").unwrap_err();
        assert_eq!(err.key, "bogus");
        assert!(err.to_string().contains("bogus"));
    }

    #[test]
    fn test_geometry() {
        let t = TileId::new(3, 1);
        assert!(t.is_lower());
        assert!(!t.is_diagonal());
        assert_eq!(t.transposed(), TileId::new(1, 3));
        assert!(TileId::new(2, 2).is_diagonal());
        assert!(!TileId::new(2, 2).is_lower());
    }

    #[test]
    fn test_kind_union() {
        assert_eq!(TileKind::A.union(TileKind::A), TileKind::A);
        assert_eq!(TileKind::A.union(TileKind::B), TileKind::Both);
        assert_eq!(TileKind::B.union(TileKind::Both), TileKind::Both);
        assert!(TileKind::Both.has_a());
        assert!(TileKind::Both.has_b());
        assert!(!TileKind::B.has_a());
        assert!(!TileKind::A.has_b());
    }
}
