//! IPASN prefix table and its text database format.
//!
//! A [`PrefixTable`] maps each announced prefix to its [`Origin`]. Tables are
//! written as `IP-ASN32-DAT` text files, one `prefix<TAB>origin` line per
//! entry, preceded by a `;`-commented header carrying provenance and counts:
//!
//! ```text
//! ; IP-ASN32-DAT file
//! ; Original file : rib.20200101.0600.bz2
//! ; Prefixes-v4   : 2
//! ; Prefixes-v6   : 1
//! ;
//! 1.0.0.0/24	13335
//! 8.8.8.0/24	15169
//! 2001:db8::/32	{64500,64501}
//! ```

use crate::error::{ConvertError, Result};
use chrono::{SecondsFormat, Utc};
use ipnet::IpNet;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{Display, Formatter};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// First line of every IPASN database file.
pub const IPASN_FILE_MAGIC: &str = "; IP-ASN32-DAT file";

// =============================================================================
// Origin
// =============================================================================

/// Origin AS of a prefix.
///
/// Most prefixes have exactly one origin. When the AS path ends in an AS_SET
/// the prefix is attributed to every AS in the set, kept in ascending order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Origin {
    Single(u32),
    Set(BTreeSet<u32>),
}

impl Origin {
    /// Build an origin from a list of ASNs, deduplicating them.
    ///
    /// Returns `None` for an empty list. A list with a single distinct ASN
    /// always becomes [`Origin::Single`].
    pub fn from_asns<I: IntoIterator<Item = u32>>(asns: I) -> Option<Origin> {
        let set: BTreeSet<u32> = asns.into_iter().collect();
        match set.len() {
            0 => None,
            1 => set.into_iter().next().map(Origin::Single),
            _ => Some(Origin::Set(set)),
        }
    }

    /// The lowest ASN of the origin.
    pub fn first(&self) -> u32 {
        match self {
            Origin::Single(asn) => *asn,
            Origin::Set(set) => set.iter().next().copied().unwrap_or_default(),
        }
    }

    /// All ASNs in ascending order.
    pub fn asns(&self) -> Vec<u32> {
        match self {
            Origin::Single(asn) => vec![*asn],
            Origin::Set(set) => set.iter().copied().collect(),
        }
    }

    pub fn is_multi(&self) -> bool {
        matches!(self, Origin::Set(_))
    }
}

impl Display for Origin {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Origin::Single(asn) => write!(f, "{}", asn),
            Origin::Set(set) => write!(f, "{{{}}}", set.iter().join(",")),
        }
    }
}

impl FromStr for Origin {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let s = s.trim();
        if let Some(inner) = s.strip_prefix('{').and_then(|v| v.strip_suffix('}')) {
            let asns = inner
                .split(',')
                .map(|v| {
                    v.trim()
                        .parse::<u32>()
                        .map_err(|_| format!("invalid ASN '{}' in origin set '{}'", v, s))
                })
                .collect::<std::result::Result<Vec<u32>, String>>()?;
            return Origin::from_asns(asns).ok_or_else(|| format!("empty origin set '{}'", s));
        }
        s.parse::<u32>()
            .map(Origin::Single)
            .map_err(|_| format!("invalid origin '{}'", s))
    }
}

// =============================================================================
// Prefix table
// =============================================================================

/// Number of IPv4 and IPv6 entries in a table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrefixCounts {
    pub ipv4: usize,
    pub ipv6: usize,
}

impl PrefixCounts {
    pub fn total(&self) -> usize {
        self.ipv4 + self.ipv6
    }
}

/// Prefix-to-origin mapping built from one archive.
///
/// Keys are unique; inserting a prefix that is already present replaces its
/// origin. Iteration follows `IpNet` ordering (IPv4 first), so anything
/// derived from a table is deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrefixTable {
    entries: BTreeMap<IpNet, Origin>,
}

impl PrefixTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the origin of `prefix`, returning the previous origin.
    pub fn insert(&mut self, prefix: IpNet, origin: Origin) -> Option<Origin> {
        self.entries.insert(prefix, origin)
    }

    pub fn get(&self, prefix: &IpNet) -> Option<&Origin> {
        self.entries.get(prefix)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&IpNet, &Origin)> {
        self.entries.iter()
    }

    /// Partition the entries by address family.
    pub fn counts(&self) -> PrefixCounts {
        let ipv6 = self
            .entries
            .keys()
            .filter(|p| matches!(p, IpNet::V6(_)))
            .count();
        PrefixCounts {
            ipv4: self.entries.len() - ipv6,
            ipv6,
        }
    }
}

impl FromIterator<(IpNet, Origin)> for PrefixTable {
    fn from_iter<T: IntoIterator<Item = (IpNet, Origin)>>(iter: T) -> Self {
        PrefixTable {
            entries: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a PrefixTable {
    type Item = (&'a IpNet, &'a Origin);
    type IntoIter = std::collections::btree_map::Iter<'a, IpNet, Origin>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

// =============================================================================
// Writer
// =============================================================================

/// How multi-origin prefixes are written.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MultiOriginFormat {
    /// `{a,b,c}` with ascending ASNs
    #[default]
    Set,
    /// Only the lowest ASN, for readers that expect a plain integer
    First,
}

impl FromStr for MultiOriginFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "set" => Ok(MultiOriginFormat::Set),
            "first" => Ok(MultiOriginFormat::First),
            _ => Err(format!(
                "unknown multi-origin format '{}', expected 'set' or 'first'",
                s
            )),
        }
    }
}

/// Serializes a [`PrefixTable`] into the IPASN text format.
#[derive(Debug, Clone, Copy, Default)]
pub struct IpasnWriter {
    multi_origin: MultiOriginFormat,
    write_timestamp: bool,
}

impl IpasnWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_multi_origin(mut self, format: MultiOriginFormat) -> Self {
        self.multi_origin = format;
        self
    }

    /// Add a `Converted on` header line. Off by default so identical input
    /// produces byte-identical files.
    pub fn with_timestamp(mut self, enabled: bool) -> Self {
        self.write_timestamp = enabled;
        self
    }

    /// Write `table` to any sink, tagging it with `provenance`.
    pub fn write_to<W: Write>(
        &self,
        table: &PrefixTable,
        provenance: &str,
        out: &mut W,
    ) -> std::io::Result<()> {
        let counts = table.counts();
        let provenance = provenance.replace(['\n', '\r'], " ");

        writeln!(out, "{}", IPASN_FILE_MAGIC)?;
        writeln!(out, "; Original file : {}", provenance)?;
        if self.write_timestamp {
            writeln!(
                out,
                "; Converted on  : {}",
                Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
            )?;
        }
        writeln!(out, "; Prefixes-v4   : {}", counts.ipv4)?;
        writeln!(out, "; Prefixes-v6   : {}", counts.ipv6)?;
        writeln!(out, ";")?;

        for (prefix, origin) in table {
            match (self.multi_origin, origin) {
                (MultiOriginFormat::First, Origin::Set(_)) => {
                    writeln!(out, "{}\t{}", prefix, origin.first())?
                }
                _ => writeln!(out, "{}\t{}", prefix, origin)?,
            }
        }
        Ok(())
    }

    /// Write `table` to `path`.
    ///
    /// Data goes to a `.part` sibling first and is renamed into place once
    /// complete, so `path` either holds a full database or is untouched.
    pub fn write_file(&self, table: &PrefixTable, path: &Path, provenance: &str) -> Result<()> {
        let tmp_path = partial_path(path);

        let result = File::create(&tmp_path).and_then(|file| {
            let mut writer = BufWriter::new(file);
            self.write_to(table, provenance, &mut writer)?;
            writer.flush()
        });

        match result.and_then(|_| std::fs::rename(&tmp_path, path)) {
            Ok(()) => Ok(()),
            Err(e) => {
                let _ = std::fs::remove_file(&tmp_path);
                Err(ConvertError::write(path, e))
            }
        }
    }
}

fn partial_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".part");
    path.with_file_name(name)
}

// =============================================================================
// Reader
// =============================================================================

/// Parse an IPASN database from a buffered reader.
///
/// `source` is only used in error messages.
pub fn read_ipasn<R: BufRead>(reader: R, source: &Path) -> Result<PrefixTable> {
    let mut table = PrefixTable::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line.map_err(|e| ConvertError::io(source, e))?;
        let line = line.trim();
        if line.is_empty() || line.starts_with(';') {
            continue;
        }
        let (prefix, origin) = line
            .split_once(char::is_whitespace)
            .ok_or_else(|| ConvertError::parse(source, format!("line {}: missing origin", idx + 1)))?;
        let prefix = prefix
            .parse::<IpNet>()
            .map_err(|e| ConvertError::parse(source, format!("line {}: {}", idx + 1, e)))?;
        let origin = origin
            .parse::<Origin>()
            .map_err(|e| ConvertError::parse(source, format!("line {}: {}", idx + 1, e)))?;
        table.insert(prefix, origin);
    }
    Ok(table)
}

/// Load an IPASN database file; `.gz` and `.bz2` files are decompressed on the fly.
pub fn read_ipasn_file(path: &Path) -> Result<PrefixTable> {
    let path_str = path
        .to_str()
        .ok_or_else(|| ConvertError::parse(path, "path is not valid UTF-8"))?;
    let reader = oneio::get_reader(path_str)
        .map_err(|e| ConvertError::io(path, std::io::Error::other(e.to_string())))?;
    read_ipasn(BufReader::new(reader), path)
}
