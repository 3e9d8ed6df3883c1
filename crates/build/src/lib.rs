////////////////////////////////////////////////////////////////////////////////
// This file is part of "Zend Compat", a version-stable compatibility         //
// layer over the Zend engine's macro surface.                                //
//                                                                            //
// This work is proprietary software with source-available code.              //
//                                                                            //
// To copy, use, distribute, or contribute to this work, you must agree to    //
// the terms of the General License Agreement distributed with this work.     //
//                                                                            //
// The agreement grants a Basic Commercial License, allowing you to use       //
// this work in non-commercial and limited commercial products with a total   //
// gross revenue cap. To remove this commercial limit for one of your         //
// products, you must acquire a Full Commercial License.                      //
//                                                                            //
// If you contribute to the source code, documentation, or related materials, //
// you must grant me an exclusive license to these contributions.             //
// Contributions are governed by the "Contributions" section of the General   //
// License Agreement.                                                         //
//                                                                            //
// Copying the work in parts is strictly forbidden, except as permitted       //
// under the General License Agreement.                                       //
//                                                                            //
// If you do not or cannot agree to the terms of this Agreement,              //
// do not use this work.                                                      //
//                                                                            //
// This work is provided "as is", without any warranties, express or implied, //
// except where such disclaimers are legally invalid.                         //
//                                                                            //
// Copyright (c) 2024 Ilya Lakhin (Илья Александрович Лахин).                 //
// All rights reserved.                                                       //
////////////////////////////////////////////////////////////////////////////////

//! Build-time host detection for the Zend compatibility layer.
//!
//! The crate decides which implementation variant of the compatibility
//! layer matches the host the extension is built against, and reports the
//! decision to the compiler as `cfg` flags. Call [register_configures] from
//! the build script of a crate that depends on the compatibility layer:
//!
//! ```no_run
//! fn main() {
//!     zend_compat_build::register_configures();
//! }
//! ```
//!
//! The host is described by environment variables read at build time:
//!
//! - `ZEND_COMPAT_PHP_VERSION`: the host version, either dotted (`"8.1"`,
//!   `"7.4.33"`) or a numeric version id (`"80100"`). Defaults to the
//!   version of the reference host.
//! - `ZEND_COMPAT_DEBUG`: whether the host is a debug build.
//! - `ZEND_COMPAT_ZTS`: whether the host is thread-safe.

use std::{
    env,
    error::Error,
    fmt::{Display, Formatter},
};

use semver::{BuildMetadata, Comparator, Op, Prerelease, Version, VersionReq};

pub const VERSION_VAR: &str = "ZEND_COMPAT_PHP_VERSION";
pub const DEBUG_VAR: &str = "ZEND_COMPAT_DEBUG";
pub const ZTS_VAR: &str = "ZEND_COMPAT_ZTS";

/// An implementation variant of the compatibility layer.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
#[non_exhaustive]
pub enum AbiVariant {
    /// Hosts 7.0 and 7.1.
    V7_0,

    /// Hosts 7.2.
    V7_2,

    /// Hosts 7.3 and 7.4.
    V7_3,

    /// Hosts 8.x.
    V8_0,
}

impl Display for AbiVariant {
    #[inline(always)]
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.cfg_value())
    }
}

impl AbiVariant {
    pub const ALL: [Self; 4] = [Self::V7_0, Self::V7_2, Self::V7_3, Self::V8_0];

    /// The value of the `zend_compat_abi` cfg flag selecting this variant.
    #[inline(always)]
    pub const fn cfg_value(self) -> &'static str {
        match self {
            Self::V7_0 => "7.0",
            Self::V7_2 => "7.2",
            Self::V7_3 => "7.3",
            Self::V8_0 => "8.0",
        }
    }
}

/// A half-open range of host versions served by one variant.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct AbiRange {
    pub lower: Version,
    pub upper: Version,
    pub variant: AbiVariant,
}

impl AbiRange {
    #[inline(always)]
    const fn new(lower: (u64, u64), upper: (u64, u64), variant: AbiVariant) -> Self {
        Self {
            lower: Version::new(lower.0, lower.1, 0),
            upper: Version::new(upper.0, upper.1, 0),
            variant,
        }
    }

    /// The version predicate of the range: `>=lower, <upper`.
    pub fn requirement(&self) -> VersionReq {
        VersionReq {
            comparators: vec![
                comparator(Op::GreaterEq, &self.lower),
                comparator(Op::Less, &self.upper),
            ],
        }
    }

    #[inline(always)]
    fn overlaps(&self, other: &Self) -> bool {
        self.lower < other.upper && other.lower < self.upper
    }
}

fn comparator(op: Op, version: &Version) -> Comparator {
    Comparator {
        op,
        major: version.major,
        minor: Some(version.minor),
        patch: Some(version.patch),
        pre: Prerelease::EMPTY,
    }
}

/// Returns the variant table, newest variant first.
pub fn abi_table() -> Vec<AbiRange> {
    vec![
        AbiRange::new((8, 0), (9, 0), AbiVariant::V8_0),
        AbiRange::new((7, 3), (8, 0), AbiVariant::V7_3),
        AbiRange::new((7, 2), (7, 3), AbiVariant::V7_2),
        AbiRange::new((7, 0), (7, 2), AbiVariant::V7_0),
    ]
}

/// Checks that the ranges of a table are pairwise disjoint and ordered
/// newest first.
pub fn validate_table(table: &[AbiRange]) -> Result<(), BuildError> {
    for (index, first) in table.iter().enumerate() {
        for second in &table[index + 1..] {
            if first.overlaps(second) {
                return Err(BuildError::AmbiguousPredicates {
                    first: first.variant,
                    second: second.variant,
                });
            }

            if first.lower < second.lower {
                return Err(BuildError::UnorderedPredicates {
                    first: first.variant,
                    second: second.variant,
                });
            }
        }
    }

    Ok(())
}

/// Selects the variant serving `version`.
///
/// The first predicate of the table matching the version wins. A version
/// outside of every range is an error.
pub fn select_abi(version: &Version) -> Result<AbiVariant, BuildError> {
    let table = abi_table();

    validate_table(&table)?;

    let version = Version {
        pre: Prerelease::EMPTY,
        build: BuildMetadata::EMPTY,
        ..version.clone()
    };

    for range in &table {
        if range.requirement().matches(&version) {
            return Ok(range.variant);
        }
    }

    Err(BuildError::UnsupportedVersion { version })
}

/// Parses a host version: `"8"`, `"8.1"`, `"7.4.33"`, a release with a
/// suffix such as `"8.1.0RC1"` or `"8.1RC1"`, or a numeric version id such
/// as `"80100"`.
///
/// A version has at most three components. A version without dots is a
/// major version of one or two digits, or a version id of five or more.
pub fn parse_version(input: &str) -> Result<Version, BuildError> {
    let malformed = || BuildError::MalformedVersion {
        input: input.to_string(),
    };

    let trimmed = input.trim();

    let core_end = trimmed
        .find(|character: char| !character.is_ascii_digit() && character != '.')
        .unwrap_or(trimmed.len());

    let (core, suffix) = trimmed.split_at(core_end);

    if core.is_empty() {
        return Err(malformed());
    }

    if let Some(first) = suffix.chars().next() {
        if !first.is_ascii_alphabetic() && first != '-' && first != '+' {
            return Err(malformed());
        }
    }

    if !core.contains('.') {
        return match core.len() {
            1 | 2 => Ok(Version::new(core.parse().map_err(|_| malformed())?, 0, 0)),

            length if length >= 5 && suffix.is_empty() => {
                let id = core.parse::<u64>().map_err(|_| malformed())?;

                Ok(Version::new(id / 10000, id / 100 % 100, id % 100))
            }

            _ => Err(malformed()),
        };
    }

    let mut components = [0u64; 3];
    let mut count = 0;

    for part in core.split('.') {
        let Some(component) = components.get_mut(count) else {
            return Err(malformed());
        };

        *component = part.parse::<u64>().map_err(|_| malformed())?;
        count += 1;
    }

    Ok(Version::new(components[0], components[1], components[2]))
}

fn parse_flag(name: &'static str, value: &str) -> Result<bool, BuildError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "" | "0" | "false" | "no" | "off" => Ok(false),
        "1" | "true" | "yes" | "on" => Ok(true),

        _ => Err(BuildError::MalformedFlag {
            name,
            value: value.to_string(),
        }),
    }
}

/// A description of the host an extension is built against.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
#[non_exhaustive]
pub struct HostConfig {
    /// The host version.
    ///
    /// The default value is the version of the reference host.
    pub version: Version,

    /// If set to true, the host is a debug build.
    ///
    /// The default value is false.
    pub debug: bool,

    /// If set to true, the host is a thread-safe build.
    ///
    /// The default value is false.
    pub zts: bool,
}

impl Default for HostConfig {
    #[inline(always)]
    fn default() -> Self {
        Self::new()
    }
}

impl HostConfig {
    /// The default constructor for this configuration object. Describes the
    /// reference host.
    #[inline(always)]
    pub const fn new() -> Self {
        Self {
            version: Version::new(
                zend_compat_engine::PHP_MAJOR_VERSION,
                zend_compat_engine::PHP_MINOR_VERSION,
                zend_compat_engine::PHP_RELEASE_VERSION,
            ),
            debug: zend_compat_engine::ZEND_DEBUG,
            zts: zend_compat_engine::ZTS,
        }
    }

    /// Reads the configuration from the build environment. Unset variables
    /// keep their default values.
    pub fn from_env() -> Result<Self, BuildError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&'static str) -> Option<String>) -> Result<Self, BuildError> {
        let mut config = Self::new();

        if let Some(version) = lookup(VERSION_VAR) {
            config.version = parse_version(&version)?;
        }

        if let Some(debug) = lookup(DEBUG_VAR) {
            config.debug = parse_flag(DEBUG_VAR, &debug)?;
        }

        if let Some(zts) = lookup(ZTS_VAR) {
            config.zts = parse_flag(ZTS_VAR, &zts)?;
        }

        Ok(config)
    }

    /// Returns the build script instructions describing this host.
    pub fn configures(&self) -> Result<Vec<String>, BuildError> {
        let variant = select_abi(&self.version)?;

        let mut lines = vec![
            format!("cargo:rustc-cfg=zend_compat_abi=\"{}\"", variant.cfg_value()),
            format!("cargo:rustc-cfg=zend_compat_major_version=\"{}\"", self.version.major),
            format!("cargo:rustc-cfg=zend_compat_minor_version=\"{}\"", self.version.minor),
            format!(
                "cargo:rustc-cfg=zend_compat_php_version=\"{}.{}\"",
                self.version.major, self.version.minor,
            ),
        ];

        if self.debug {
            lines.push(String::from("cargo:rustc-cfg=zend_compat_debug"));
        }

        if self.zts {
            lines.push(String::from("cargo:rustc-cfg=zend_compat_zts"));
        }

        let abi_values = AbiVariant::ALL
            .iter()
            .map(|variant| format!("\"{}\"", variant.cfg_value()))
            .collect::<Vec<_>>()
            .join(", ");

        lines.push(format!("cargo:rustc-check-cfg=cfg(zend_compat_abi, values({abi_values}))"));
        lines.push(String::from("cargo:rustc-check-cfg=cfg(zend_compat_major_version, values(any()))"));
        lines.push(String::from("cargo:rustc-check-cfg=cfg(zend_compat_minor_version, values(any()))"));
        lines.push(String::from("cargo:rustc-check-cfg=cfg(zend_compat_php_version, values(any()))"));
        lines.push(String::from("cargo:rustc-check-cfg=cfg(zend_compat_debug)"));
        lines.push(String::from("cargo:rustc-check-cfg=cfg(zend_compat_zts)"));

        for name in [VERSION_VAR, DEBUG_VAR, ZTS_VAR] {
            lines.push(format!("cargo:rerun-if-env-changed={name}"));
        }

        Ok(lines)
    }
}

/// Registers the host description of the build environment as `cfg` flags
/// of the crate being built.
///
/// # Panics
///
/// Panics if the environment is malformed or describes an unsupported
/// host version. This fails the build.
pub fn register_configures() {
    let config = match HostConfig::from_env() {
        Ok(config) => config,
        Err(error) => panic!("{error}"),
    };

    if env::var_os(VERSION_VAR).is_none() {
        println!(
            "cargo:warning={VERSION_VAR} is not set, building against the reference host {}",
            config.version,
        );
    }

    let lines = match config.configures() {
        Ok(lines) => lines,
        Err(error) => panic!("{error}"),
    };

    for line in lines {
        println!("{line}");
    }
}

/// A build configuration error.
#[derive(Clone, PartialEq, Eq, Debug)]
#[non_exhaustive]
pub enum BuildError {
    /// The host version string cannot be parsed.
    MalformedVersion {
        /// The version string as provided.
        input: String,
    },

    /// A boolean environment variable has an unrecognized value.
    MalformedFlag {
        /// The variable name.
        name: &'static str,

        /// The value as provided.
        value: String,
    },

    /// No variant serves the host version.
    UnsupportedVersion {
        /// The host version.
        version: Version,
    },

    /// Two version predicates of the variant table can match the same
    /// version.
    AmbiguousPredicates {
        /// The variant of the earlier predicate.
        first: AbiVariant,

        /// The variant of the later predicate.
        second: AbiVariant,
    },

    /// The variant table is not ordered newest first.
    UnorderedPredicates {
        /// The variant of the earlier predicate.
        first: AbiVariant,

        /// The variant of the later predicate.
        second: AbiVariant,
    },
}

impl Display for BuildError {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MalformedVersion { input } => {
                formatter.write_fmt(format_args!("malformed host version {input:?}"))
            }

            Self::MalformedFlag { name, value } => {
                formatter.write_fmt(format_args!("malformed {name} value {value:?}"))
            }

            Self::UnsupportedVersion { version } => formatter.write_fmt(format_args!(
                "unsupported host version {version}, supported versions are 7.0 to 8.x",
            )),

            Self::AmbiguousPredicates { first, second } => formatter.write_fmt(format_args!(
                "version predicates of variants {first} and {second} overlap",
            )),

            Self::UnorderedPredicates { first, second } => formatter.write_fmt(format_args!(
                "version predicate of variant {first} precedes the newer variant {second}",
            )),
        }
    }
}

impl Error for BuildError {}

#[cfg(test)]
mod tests {
    use super::*;

    fn version(input: &str) -> Version {
        parse_version(input).expect("valid version")
    }

    #[test]
    fn test_parse_version() {
        assert_eq!(version("8.1"), Version::new(8, 1, 0));
        assert_eq!(version("7.4.33"), Version::new(7, 4, 33));
        assert_eq!(version(" 8.0.30 "), Version::new(8, 0, 30));
        assert_eq!(version("8.2.0RC1"), Version::new(8, 2, 0));
        assert_eq!(version("80100"), Version::new(8, 1, 0));
        assert_eq!(version("70433"), Version::new(7, 4, 33));
        assert_eq!(version("8"), Version::new(8, 0, 0));
        assert_eq!(version("8.1RC1"), Version::new(8, 1, 0));
        assert_eq!(version("8.3.0-dev"), Version::new(8, 3, 0));
        assert_eq!(version("8.1.0RC1"), version("8.1RC1"));

        for input in ["", "php", "8.x", "x.1", "123", "7.4.33.1", "8.", ".8", "8..1", "8.1 RC1", "80100RC1"] {
            assert_eq!(
                parse_version(input),
                Err(BuildError::MalformedVersion {
                    input: input.to_string()
                }),
            );
        }
    }

    #[test]
    fn test_table_is_valid() {
        let table = abi_table();

        assert!(validate_table(&table).is_ok());

        let variants = table.iter().map(|range| range.variant).collect::<Vec<_>>();
        assert_eq!(
            variants,
            [AbiVariant::V8_0, AbiVariant::V7_3, AbiVariant::V7_2, AbiVariant::V7_0],
        );
    }

    #[test]
    fn test_validation_rejects_overlaps_and_order() {
        let overlapping = [
            AbiRange::new((8, 0), (9, 0), AbiVariant::V8_0),
            AbiRange::new((7, 3), (8, 1), AbiVariant::V7_3),
        ];

        assert_eq!(
            validate_table(&overlapping),
            Err(BuildError::AmbiguousPredicates {
                first: AbiVariant::V8_0,
                second: AbiVariant::V7_3,
            }),
        );

        let unordered = [
            AbiRange::new((7, 3), (8, 0), AbiVariant::V7_3),
            AbiRange::new((8, 0), (9, 0), AbiVariant::V8_0),
        ];

        assert_eq!(
            validate_table(&unordered),
            Err(BuildError::UnorderedPredicates {
                first: AbiVariant::V7_3,
                second: AbiVariant::V8_0,
            }),
        );
    }

    #[test]
    fn test_every_supported_version_has_one_variant() {
        let table = abi_table();

        for major in 7..=8 {
            for minor in 0..=9 {
                for patch in [0, 1, 33] {
                    let version = Version::new(major, minor, patch);

                    let matching = table
                        .iter()
                        .filter(|range| range.requirement().matches(&version))
                        .count();

                    assert_eq!(matching, 1, "{version}");
                }
            }
        }
    }

    #[test]
    fn test_selection() {
        let cases = [
            ("7.0", AbiVariant::V7_0),
            ("7.1.33", AbiVariant::V7_0),
            ("7.2", AbiVariant::V7_2),
            ("7.2.34", AbiVariant::V7_2),
            ("7.3.0", AbiVariant::V7_3),
            ("7.4.33", AbiVariant::V7_3),
            ("8.0", AbiVariant::V8_0),
            ("8.1.0", AbiVariant::V8_0),
            ("8.3.2", AbiVariant::V8_0),
        ];

        for (input, expected) in cases {
            assert_eq!(select_abi(&version(input)), Ok(expected), "{input}");
        }

        assert_eq!(select_abi(&Version::parse("8.1.0-dev").expect("version")), Ok(AbiVariant::V8_0));
    }

    #[test]
    fn test_unsupported_versions() {
        for input in ["5.6", "5.6.40", "6.0", "9.0", "10.1"] {
            assert!(
                matches!(select_abi(&version(input)), Err(BuildError::UnsupportedVersion { .. })),
                "{input}",
            );
        }
    }

    #[test]
    fn test_config_lookup() {
        let config = HostConfig::from_lookup(|name| match name {
            VERSION_VAR => Some(String::from("70433")),
            ZTS_VAR => Some(String::from("yes")),
            _ => None,
        })
        .expect("valid config");

        assert_eq!(config.version, Version::new(7, 4, 33));
        assert!(!config.debug);
        assert!(config.zts);

        let error = HostConfig::from_lookup(|name| match name {
            DEBUG_VAR => Some(String::from("maybe")),
            _ => None,
        })
        .expect_err("malformed flag");

        assert_eq!(error.to_string(), "malformed ZEND_COMPAT_DEBUG value \"maybe\"");

        assert_eq!(
            HostConfig::from_lookup(|_| None).expect("defaults"),
            HostConfig::default(),
        );
    }

    #[test]
    fn test_configures() {
        let config = HostConfig {
            version: Version::new(7, 2, 34),
            debug: true,
            zts: false,
        };

        let lines = config.configures().expect("supported");

        assert!(lines.contains(&String::from("cargo:rustc-cfg=zend_compat_abi=\"7.2\"")));
        assert!(lines.contains(&String::from("cargo:rustc-cfg=zend_compat_php_version=\"7.2\"")));
        assert!(lines.contains(&String::from("cargo:rustc-cfg=zend_compat_debug")));
        assert!(!lines.contains(&String::from("cargo:rustc-cfg=zend_compat_zts")));
        assert!(lines.contains(&String::from(
            "cargo:rustc-check-cfg=cfg(zend_compat_abi, values(\"7.0\", \"7.2\", \"7.3\", \"8.0\"))"
        )));
        assert!(lines.contains(&String::from("cargo:rerun-if-env-changed=ZEND_COMPAT_PHP_VERSION")));

        let unsupported = HostConfig {
            version: Version::new(5, 6, 40),
            ..HostConfig::new()
        };

        assert!(unsupported.configures().is_err());
    }
}
