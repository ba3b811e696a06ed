//! Type-safe newtypes and entity records for the index core.
//!
//! These newtypes provide compile-time safety and semantic clarity
//! for core domain concepts. Entity ids are machine-assigned SQLite
//! rowids and never cross entity kinds.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Database identifier for indexed files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileId(pub i64);

/// Database identifier for source types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TypeId(pub i64);

/// Database identifier for type members and free functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MemberId(pub i64);

/// Database identifier for content assets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetId(pub i64);

macro_rules! impl_id {
    ($name:ident, $tag:literal) => {
        impl $name {
            #[must_use]
            pub const fn new(id: i64) -> Self {
                Self(id)
            }

            #[must_use]
            pub const fn as_i64(self) -> i64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                let id = self.0;
                write!(f, concat!($tag, ":{}"), id)
            }
        }

        impl From<i64> for $name {
            fn from(id: i64) -> Self {
                Self(id)
            }
        }

        impl From<$name> for i64 {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

impl_id!(FileId, "file");
impl_id!(TypeId, "type");
impl_id!(MemberId, "member");
impl_id!(AssetId, "asset");

/// Relevance score in range [0.0, 1.0].
///
/// Saturating constructor ensures scores never exceed bounds,
/// making score merging operations safe.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Score(f64);

impl Score {
    /// Zero relevance score.
    pub const ZERO: Self = Self(0.0);

    /// Maximum relevance score.
    pub const MAX: Self = Self(1.0);

    /// Creates a new score, saturating to [0.0, 1.0] bounds.
    #[must_use]
    pub fn new(value: f64) -> Self {
        Self(value.clamp(0.0, 1.0))
    }

    #[must_use]
    pub const fn as_f64(self) -> f64 {
        self.0
    }

    /// Combines two scores with bounded addition.
    #[must_use]
    pub fn merge(self, other: Self) -> Self {
        Self::new(self.0 + other.0)
    }
}

impl Default for Score {
    fn default() -> Self {
        Self::ZERO
    }
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.3}", self.0)
    }
}

/// A 24-bit trigram: three consecutive lowercased bytes packed as
/// `(b0 << 16) | (b1 << 8) | b2`.
///
/// Trigrams are the building block of both the fuzzy-name postings and
/// the grep pre-filter. Packing into a `u32` keeps posting keys `Copy`
/// and lets SQLite store them as plain integers.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Trigram(u32);

impl Trigram {
    #[must_use]
    pub const fn from_packed(packed: u32) -> Self {
        Self(packed & 0x00FF_FFFF)
    }

    #[must_use]
    pub const fn pack(b0: u8, b1: u8, b2: u8) -> Self {
        Self(((b0 as u32) << 16) | ((b1 as u32) << 8) | (b2 as u32))
    }

    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self.0
    }

    #[must_use]
    pub const fn bytes(self) -> [u8; 3] {
        [(self.0 >> 16) as u8, (self.0 >> 8) as u8, self.0 as u8]
    }
}

impl fmt::Debug for Trigram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = self.bytes();
        if let Ok(s) = std::str::from_utf8(&b) {
            write!(f, "Trigram({s:?})")
        } else {
            write!(f, "Trigram({:06x})", self.0)
        }
    }
}

impl fmt::Display for Trigram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = self.bytes();
        if let Ok(s) = std::str::from_utf8(&b) {
            write!(f, "{s}")
        } else {
            write!(f, "{:06x}", self.0)
        }
    }
}

/// Language discriminator for files.
///
/// Separates real source files from synthetic per-asset entries used
/// for full-text asset search. Unknown strings fold to `Other` so the
/// ingest surface stays open to new parsers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum Language {
    AngelScript,
    Cpp,
    Config,
    Asset,
    Other,
}

impl From<String> for Language {
    fn from(s: String) -> Self {
        s.parse().unwrap_or(Self::Other)
    }
}

impl Language {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AngelScript => "angelscript",
            Self::Cpp => "cpp",
            Self::Config => "config",
            Self::Asset => "asset",
            Self::Other => "other",
        }
    }

    /// Whether file bodies of this language participate in content search.
    #[must_use]
    pub const fn is_text_searchable(self) -> bool {
        matches!(self, Self::AngelScript | Self::Cpp | Self::Config)
    }

    /// File-extension alternatives used when constructing engine queries.
    #[must_use]
    pub const fn extension_pattern(self) -> Option<&'static str> {
        match self {
            Self::AngelScript => Some(r"\.as$"),
            Self::Cpp => Some(r"\.(h|hpp|hxx|cpp|cc|inl)$"),
            Self::Config => Some(r"\.(ini|cfg)$"),
            Self::Asset | Self::Other => None,
        }
    }
}

impl std::str::FromStr for Language {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_ascii_lowercase().as_str() {
            "angelscript" | "as" => Self::AngelScript,
            "cpp" | "c++" | "cxx" => Self::Cpp,
            "config" | "ini" => Self::Config,
            "asset" => Self::Asset,
            _ => Self::Other,
        })
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of a source type declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TypeKind {
    Class,
    Struct,
    Enum,
    Interface,
    Event,
    Delegate,
    Namespace,
}

impl TypeKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Class => "class",
            Self::Struct => "struct",
            Self::Enum => "enum",
            Self::Interface => "interface",
            Self::Event => "event",
            Self::Delegate => "delegate",
            Self::Namespace => "namespace",
        }
    }

    /// Kinds that participate in the inheritance graph.
    #[must_use]
    pub const fn is_inheritable(self) -> bool {
        matches!(self, Self::Class | Self::Struct | Self::Interface)
    }
}

impl std::str::FromStr for TypeKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "class" => Ok(Self::Class),
            "struct" => Ok(Self::Struct),
            "enum" => Ok(Self::Enum),
            "interface" => Ok(Self::Interface),
            "event" => Ok(Self::Event),
            "delegate" => Ok(Self::Delegate),
            "namespace" => Ok(Self::Namespace),
            other => Err(format!("unknown type kind: '{other}'")),
        }
    }
}

impl fmt::Display for TypeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of a type member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", from = "String")]
pub enum MemberKind {
    Function,
    Property,
    EnumValue,
    Other,
}

impl From<String> for MemberKind {
    fn from(s: String) -> Self {
        s.parse().unwrap_or(Self::Other)
    }
}

impl MemberKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Function => "function",
            Self::Property => "property",
            Self::EnumValue => "enum_value",
            Self::Other => "other",
        }
    }
}

impl std::str::FromStr for MemberKind {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_ascii_lowercase().as_str() {
            "function" => Self::Function,
            "property" => Self::Property,
            "enum_value" | "enumvalue" => Self::EnumValue,
            _ => Self::Other,
        })
    }
}

impl fmt::Display for MemberKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Entity discriminator for name-trigram postings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Type,
    Member,
}

impl EntityKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Type => "type",
            Self::Member => "member",
        }
    }
}

/// A stored file row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileRecord {
    pub id: FileId,
    pub path: String,
    pub project: String,
    pub module: String,
    pub language: Language,
    /// Modification time in milliseconds since the epoch.
    pub mtime: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relative_path: Option<String>,
}

/// A stored type row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypeRecord {
    pub id: TypeId,
    pub file_id: FileId,
    pub name: String,
    pub kind: TypeKind,
    /// Textual base-class name. Cross-project inheritance is resolved
    /// by name, never by foreign key.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    pub line: u32,
    /// Distance from an inheritance root, computed lazily.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub depth: Option<u32>,
}

/// A stored member row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemberRecord {
    pub id: MemberId,
    pub file_id: FileId,
    /// Null for free functions and global enum values.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub type_id: Option<TypeId>,
    pub name: String,
    pub member_kind: MemberKind,
    pub line: u32,
    pub is_static: bool,
    /// Raw specifier list as emitted by the parser, e.g. "UFUNCTION,public".
    #[serde(skip_serializing_if = "Option::is_none")]
    pub specifiers: Option<String>,
}

/// A stored asset row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetRecord {
    pub id: AssetId,
    pub path: String,
    pub name: String,
    /// Virtual content path like `/Game/Blueprints/BP_Hero`.
    pub content_path: String,
    pub folder: String,
    pub project: String,
    pub extension: String,
    pub mtime: i64,
    /// Non-null for Blueprint assets.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub asset_class: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_class: Option<String>,
}

impl AssetRecord {
    /// Blueprint assets participate in the inheritance graph.
    #[must_use]
    pub fn is_blueprint(&self) -> bool {
        self.asset_class.is_some() && self.parent_class.is_some()
    }
}

/// A parser-produced type record, not yet assigned an id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewType {
    pub name: String,
    pub kind: TypeKind,
    #[serde(default)]
    pub parent: Option<String>,
    #[serde(default)]
    pub line: u32,
}

/// A parser-produced member record, not yet assigned an id.
///
/// `containing_type` names the owning type within the same file; the
/// store resolves it to a `TypeId` at insert time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewMember {
    pub name: String,
    pub member_kind: MemberKind,
    #[serde(default)]
    pub line: u32,
    #[serde(default)]
    pub is_static: bool,
    #[serde(default)]
    pub specifiers: Option<String>,
    #[serde(default)]
    pub containing_type: Option<String>,
}

/// A parser-produced asset record, not yet assigned an id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAsset {
    pub path: String,
    pub name: String,
    #[serde(default)]
    pub content_path: String,
    #[serde(default)]
    pub folder: String,
    #[serde(default)]
    pub project: String,
    #[serde(default)]
    pub extension: String,
    #[serde(default)]
    pub mtime: i64,
    #[serde(default)]
    pub asset_class: Option<String>,
    #[serde(default)]
    pub parent_class: Option<String>,
}

// Compile-time assertions for thread safety.
// These ensure Send+Sync remain implemented and catch regressions.
#[cfg(test)]
const _: () = {
    const fn assert_send_sync<T: Send + Sync>() {}

    assert_send_sync::<FileId>();
    assert_send_sync::<TypeId>();
    assert_send_sync::<MemberId>();
    assert_send_sync::<AssetId>();
    assert_send_sync::<Score>();
    assert_send_sync::<Trigram>();
    assert_send_sync::<FileRecord>();
    assert_send_sync::<TypeRecord>();
    assert_send_sync::<MemberRecord>();
    assert_send_sync::<AssetRecord>();
};
