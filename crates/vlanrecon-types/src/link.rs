//! Physical link connection parameters.
//!
//! Each parameter is a closed enumeration of the symbolic values accepted in
//! a schema, with explicit mappings to the OPX `dell-if` attribute integers
//! and to `ethtool` arguments.

use crate::ParseError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

macro_rules! link_enum {
    (
        $(#[$meta:meta])*
        $name:ident, $kind:literal {
            $($variant:ident => ($text:literal, $wire:literal)),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub enum $name {
            $($variant,)+
        }

        impl $name {
            /// Returns the schema spelling of this value.
            pub const fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text,)+
                }
            }

            /// Returns the OPX wire integer for this value.
            pub const fn wire_value(&self) -> u32 {
                match self {
                    $(Self::$variant => $wire,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = ParseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    _ => Err(ParseError::UnknownLinkValue {
                        kind: $kind,
                        value: s.to_string(),
                    }),
                }
            }
        }

        impl TryFrom<String> for $name {
            type Error = ParseError;

            fn try_from(s: String) -> Result<Self, Self::Error> {
                s.parse()
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> String {
                value.as_str().to_string()
            }
        }
    };
}

link_enum! {
    /// Autonegotiation mode.
    Autoneg, "autoneg" {
        Off => ("off", 0),
        On => ("on", 1),
    }
}

link_enum! {
    /// Port speed.
    Speed, "speed" {
        Unset => ("0M", 0),
        Mb10 => ("10M", 1),
        Mb100 => ("100M", 2),
        Gb1 => ("1G", 3),
        Gb10 => ("10G", 4),
        Gb25 => ("25G", 5),
        Gb40 => ("40G", 6),
        Gb100 => ("100G", 7),
        Auto => ("auto", 8),
        Gb20 => ("20G", 9),
        Gb50 => ("50G", 10),
        Gb200 => ("200G", 11),
        Gb400 => ("400G", 12),
        Fc4G => ("4G-FC", 13),
        Fc8G => ("8G-FC", 14),
        Fc16G => ("16G-FC", 15),
        Fc32G => ("32G-FC", 16),
        Fc2G => ("2G-FC", 17),
        Fc64G => ("64G-FC", 18),
        Fc128G => ("128G-FC", 19),
        Gb4 => ("4G", 20),
        Fc1G => ("1G-FC", 21),
    }
}

link_enum! {
    /// Duplex mode.
    Duplex, "duplex" {
        Full => ("full", 1),
        Half => ("half", 2),
        Auto => ("auto", 3),
    }
}

link_enum! {
    /// Forward error correction mode.
    Fec, "fec" {
        Auto => ("auto", 1),
        Off => ("off", 2),
        Cl91Rs => ("cl91-rs", 3),
        Cl74Fc => ("cl74-fc", 4),
        Cl108Rs => ("cl108-rs", 5),
    }
}

impl Speed {
    /// Returns the Ethernet speed in Mb/s, or None when the value has no
    /// fixed Ethernet rate (unset, auto, fibre channel).
    pub const fn megabits(&self) -> Option<u32> {
        match self {
            Self::Mb10 => Some(10),
            Self::Mb100 => Some(100),
            Self::Gb1 => Some(1_000),
            Self::Gb4 => Some(4_000),
            Self::Gb10 => Some(10_000),
            Self::Gb20 => Some(20_000),
            Self::Gb25 => Some(25_000),
            Self::Gb40 => Some(40_000),
            Self::Gb50 => Some(50_000),
            Self::Gb100 => Some(100_000),
            Self::Gb200 => Some(200_000),
            Self::Gb400 => Some(400_000),
            _ => None,
        }
    }
}

impl Fec {
    /// Returns the `ethtool --set-fec encoding` argument.
    pub const fn ethtool_encoding(&self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Off => "off",
            Self::Cl91Rs | Self::Cl108Rs => "rs",
            Self::Cl74Fc => "baser",
        }
    }
}

/// Connection parameters for a physical interface.
///
/// Unset fields fall back to the platform defaults in [`ConnectionParams::resolved`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConnectionParams {
    #[serde(default)]
    pub autoneg: Option<Autoneg>,
    #[serde(default)]
    pub speed: Option<Speed>,
    #[serde(default)]
    pub duplex: Option<Duplex>,
    #[serde(default)]
    pub fec: Option<Fec>,
}

impl ConnectionParams {
    pub const DEFAULT_AUTONEG: Autoneg = Autoneg::On;
    pub const DEFAULT_SPEED: Speed = Speed::Unset;
    pub const DEFAULT_DUPLEX: Duplex = Duplex::Full;
    pub const DEFAULT_FEC: Fec = Fec::Off;

    /// Returns every parameter, substituting defaults for unset ones.
    pub fn resolved(&self) -> (Autoneg, Speed, Duplex, Fec) {
        (
            self.autoneg.unwrap_or(Self::DEFAULT_AUTONEG),
            self.speed.unwrap_or(Self::DEFAULT_SPEED),
            self.duplex.unwrap_or(Self::DEFAULT_DUPLEX),
            self.fec.unwrap_or(Self::DEFAULT_FEC),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_wire_values() {
        assert_eq!(Autoneg::On.wire_value(), 1);
        assert_eq!(Speed::Gb10.wire_value(), 4);
        assert_eq!(Speed::Fc1G.wire_value(), 21);
        assert_eq!(Duplex::Auto.wire_value(), 3);
        assert_eq!(Fec::Cl108Rs.wire_value(), 5);
    }

    #[test]
    fn test_parse_symbolic_values() {
        assert_eq!("100G".parse::<Speed>().unwrap(), Speed::Gb100);
        assert_eq!("32G-FC".parse::<Speed>().unwrap(), Speed::Fc32G);
        assert_eq!("half".parse::<Duplex>().unwrap(), Duplex::Half);
        assert!("10g".parse::<Speed>().is_err());
        assert!(matches!(
            "maybe".parse::<Autoneg>(),
            Err(ParseError::UnknownLinkValue { kind: "autoneg", .. })
        ));
    }

    #[test]
    fn test_resolved_defaults() {
        let params = ConnectionParams {
            speed: Some(Speed::Gb25),
            ..Default::default()
        };
        assert_eq!(
            params.resolved(),
            (Autoneg::On, Speed::Gb25, Duplex::Full, Fec::Off)
        );
    }

    #[test]
    fn test_deserialize_connection() {
        let params: ConnectionParams =
            serde_yaml::from_str("autoneg: off\nspeed: 40G\nfec: cl91-rs\n").unwrap();
        assert_eq!(params.autoneg, Some(Autoneg::Off));
        assert_eq!(params.speed, Some(Speed::Gb40));
        assert_eq!(params.duplex, None);
        assert_eq!(params.fec, Some(Fec::Cl91Rs));

        assert!(serde_yaml::from_str::<ConnectionParams>("speed: 7G\n").is_err());
        assert!(serde_yaml::from_str::<ConnectionParams>("mtu: 9100\n").is_err());
    }

    #[test]
    fn test_ethtool_mappings() {
        assert_eq!(Speed::Gb10.megabits(), Some(10_000));
        assert_eq!(Speed::Auto.megabits(), None);
        assert_eq!(Speed::Fc8G.megabits(), None);
        assert_eq!(Fec::Cl74Fc.ethtool_encoding(), "baser");
    }
}
