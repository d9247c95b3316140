/* src/range.rs */

//! CIDR prefixes stored as binary strings, named range sets, and the
//! standard registry of private IPv4 blocks.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, LazyLock};

use tracing::warn;

use crate::codec;
use crate::error::{ClientIpError, Result};

/// Shortest prefix length accepted in CIDR notation.
const MIN_PREFIX_LEN: i32 = 1;
/// Longest prefix length accepted in CIDR notation.
const MAX_PREFIX_LEN: i32 = 30;
/// Bits in an IPv4 address.
const ADDRESS_BITS: usize = 32;

/// High-order bits shared by every address in a range.
///
/// CIDR literals keep their first `n` bits, with `n` in `1..=30`. A bare
/// address keeps all 32 and matches only itself.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CidrPrefix(String);

impl CidrPrefix {
    /// Parse `a.b.c.d` or `a.b.c.d/n`.
    ///
    /// The head of a CIDR literal may be partial (`172.16/12`); missing
    /// groups are filled with zeros before encoding.
    pub fn parse(literal: &str) -> Result<Self> {
        let Some((head, tail)) = literal.split_once('/') else {
            return codec::to_binary(literal)
                .map(Self)
                .ok_or_else(|| ClientIpError::InvalidAddress(literal.to_string()));
        };

        let length: i32 = tail
            .parse()
            .map_err(|_| ClientIpError::InvalidPrefixLength(literal.to_string()))?;
        if !(MIN_PREFIX_LEN..=MAX_PREFIX_LEN).contains(&length) {
            return Err(ClientIpError::PrefixLengthOutOfRange {
                literal: literal.to_string(),
                length,
            });
        }

        let head = codec::fill_partial_address(head);
        let mut bits = codec::to_binary(&head).ok_or(ClientIpError::InvalidAddress(head))?;
        bits.truncate(length as usize);
        Ok(Self(bits))
    }

    /// The stored prefix as binary digits.
    pub fn bits(&self) -> &str {
        &self.0
    }

    pub fn prefix_len(&self) -> usize {
        self.0.len()
    }

    /// Whether a 32-digit binary address starts with this prefix.
    pub fn matches_binary(&self, binary: &str) -> bool {
        binary.starts_with(&self.0)
    }

    /// Whether the dotted quad `ip` falls inside this prefix.
    pub fn contains(&self, ip: &str) -> bool {
        codec::to_binary(ip).is_some_and(|binary| self.matches_binary(&binary))
    }
}

impl FromStr for CidrPrefix {
    type Err = ClientIpError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for CidrPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut padded = self.0.clone();
        padded.extend(std::iter::repeat_n('0', ADDRESS_BITS - self.0.len()));
        match codec::from_binary(&padded) {
            Some(network) => write!(f, "{}/{}", network, self.prefix_len()),
            None => f.write_str(&self.0),
        }
    }
}

/// A named set of prefixes.
///
/// An address is a member when at least one stored prefix is a prefix of
/// its binary form.
#[derive(Debug, Clone, Default)]
pub struct RangeSet {
    name: String,
    prefixes: HashSet<CidrPrefix>,
}

impl RangeSet {
    /// Create an empty set.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            prefixes: HashSet::new(),
        }
    }

    /// Build a set from literals, dropping the malformed ones.
    pub fn from_literals<I, S>(name: impl Into<String>, literals: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = Self::new(name);
        for literal in literals {
            set.add_prefix(literal.as_ref());
        }
        set
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Parse and insert a literal, reporting why it was refused.
    pub fn try_add_prefix(&mut self, literal: &str) -> Result<CidrPrefix> {
        let prefix = CidrPrefix::parse(literal)?;
        self.prefixes.insert(prefix.clone());
        Ok(prefix)
    }

    /// Parse and insert a literal. Malformed literals are logged and dropped.
    pub fn add_prefix(&mut self, literal: &str) {
        let _ = self.add_prefix_logged(literal);
    }

    fn add_prefix_logged(&mut self, literal: &str) -> Option<ClientIpError> {
        let error = self.try_add_prefix(literal).err()?;
        warn!(range = %self.name, literal, %error, "Dropping malformed range literal");
        Some(error)
    }

    /// Add every prefix of `other` to this set.
    pub fn union(&mut self, other: &RangeSet) {
        self.prefixes.extend(other.prefixes.iter().cloned());
    }

    /// Check whether `ip` belongs to the set. Invalid addresses never do.
    pub fn contains(&self, ip: &str) -> bool {
        let Some(binary) = codec::to_binary(ip) else {
            return false;
        };
        self.prefixes.iter().any(|prefix| prefix.matches_binary(&binary))
    }

    pub fn len(&self) -> usize {
        self.prefixes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prefixes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CidrPrefix> {
        self.prefixes.iter()
    }
}

/// The ranges kept by a [`RangeRegistry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RangeCategory {
    /// 127.0.0.0/8
    Loopback,
    /// 169.254.0.0/16
    LinkLocal,
    /// RFC 1918 private blocks.
    Rfc1918,
    /// Union of the three above.
    AllPrivate,
}

impl RangeCategory {
    pub fn name(self) -> &'static str {
        match self {
            Self::Loopback => "loopback",
            Self::LinkLocal => "link-local",
            Self::Rfc1918 => "rfc1918",
            Self::AllPrivate => "all-private",
        }
    }
}

impl fmt::Display for RangeCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Literals a [`RangeRegistry`] is built from.
///
/// The default is the compiled-in set of reserved blocks.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default, rename_all = "kebab-case"))]
pub struct RangeLiterals {
    pub loopback: Vec<String>,
    pub link_local: Vec<String>,
    pub rfc1918: Vec<String>,
}

impl Default for RangeLiterals {
    fn default() -> Self {
        Self {
            // Only the first 8 bits survive, so this covers all of 127/8.
            loopback: vec!["127.0.0.1/8".to_string()],
            link_local: vec!["169.254.0.0/16".to_string()],
            rfc1918: vec![
                "10.0.0.0/8".to_string(),
                "172.16.0.0/12".to_string(),
                "192.168.0.0/16".to_string(),
            ],
        }
    }
}

/// Read-only range sets, built once.
#[derive(Debug, Clone)]
pub struct RangeRegistry {
    loopback: Arc<RangeSet>,
    link_local: Arc<RangeSet>,
    rfc1918: Arc<RangeSet>,
    all_private: Arc<RangeSet>,
    rejected: Vec<ClientIpError>,
}

impl RangeRegistry {
    /// Build a registry from the compiled-in literals.
    pub fn standard() -> Self {
        Self::from_literals(&RangeLiterals::default())
    }

    /// Build a registry from caller-supplied literals.
    ///
    /// Malformed literals never fail the build. Each one is logged and kept
    /// in [`rejected`](Self::rejected).
    pub fn from_literals(literals: &RangeLiterals) -> Self {
        let mut rejected = Vec::new();
        let loopback = load(RangeCategory::Loopback, &literals.loopback, &mut rejected);
        let link_local = load(RangeCategory::LinkLocal, &literals.link_local, &mut rejected);
        let rfc1918 = load(RangeCategory::Rfc1918, &literals.rfc1918, &mut rejected);

        let mut all_private = RangeSet::new(RangeCategory::AllPrivate.name());
        all_private.union(&link_local);
        all_private.union(&loopback);
        all_private.union(&rfc1918);

        Self {
            loopback: Arc::new(loopback),
            link_local: Arc::new(link_local),
            rfc1918: Arc::new(rfc1918),
            all_private: Arc::new(all_private),
            rejected,
        }
    }

    pub fn get(&self, category: RangeCategory) -> &Arc<RangeSet> {
        match category {
            RangeCategory::Loopback => &self.loopback,
            RangeCategory::LinkLocal => &self.link_local,
            RangeCategory::Rfc1918 => &self.rfc1918,
            RangeCategory::AllPrivate => &self.all_private,
        }
    }

    /// Check whether `ip` belongs to the given category.
    pub fn is_member(&self, category: RangeCategory, ip: &str) -> bool {
        self.get(category).contains(ip)
    }

    pub fn loopback(&self) -> &Arc<RangeSet> {
        &self.loopback
    }

    pub fn link_local(&self) -> &Arc<RangeSet> {
        &self.link_local
    }

    pub fn rfc1918(&self) -> &Arc<RangeSet> {
        &self.rfc1918
    }

    pub fn all_private(&self) -> &Arc<RangeSet> {
        &self.all_private
    }

    /// Literals dropped while building this registry.
    pub fn rejected(&self) -> &[ClientIpError] {
        &self.rejected
    }
}

impl Default for RangeRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

fn load(
    category: RangeCategory,
    literals: &[String],
    rejected: &mut Vec<ClientIpError>,
) -> RangeSet {
    let mut set = RangeSet::new(category.name());
    for literal in literals {
        rejected.extend(set.add_prefix_logged(literal));
    }
    set
}

static STANDARD_RANGES: LazyLock<RangeRegistry> = LazyLock::new(RangeRegistry::standard);

/// The process-wide registry built from the compiled-in literals.
///
/// Built on first access and never modified afterwards.
pub fn standard_ranges() -> &'static RangeRegistry {
    &STANDARD_RANGES
}

/// Check whether `ip` is loopback, link-local or RFC 1918 private.
pub fn is_private(ip: &str) -> bool {
    STANDARD_RANGES.all_private().contains(ip)
}
