//! Typed currency amounts
//!
//! Configuration carries human-readable decimal strings ("0.001" ether,
//! "3" gwei). They are parsed once into base units (wei) so the submission
//! path never does floating-point or fallible conversions.

use crate::error::SubmitterError;

use ethers::types::U256;
use ethers::utils::{format_ether, format_units, parse_ether, parse_units};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Native-currency amount, stored in wei
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Ether(U256);

/// Gas price, stored in wei
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Gwei(U256);

/// Raw integer quantity in a token's smallest unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BaseUnits(U256);

fn invalid(value: &str, err: impl fmt::Display) -> SubmitterError {
    SubmitterError::InvalidAmount {
        value: value.to_string(),
        message: err.to_string(),
    }
}

impl Ether {
    pub fn from_wei(wei: U256) -> Self {
        Self(wei)
    }

    pub fn wei(&self) -> U256 {
        self.0
    }
}

impl Gwei {
    pub fn from_wei(wei: U256) -> Self {
        Self(wei)
    }

    pub fn wei(&self) -> U256 {
        self.0
    }
}

impl BaseUnits {
    pub fn new(value: U256) -> Self {
        Self(value)
    }

    pub fn value(&self) -> U256 {
        self.0
    }
}

impl FromStr for Ether {
    type Err = SubmitterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_ether(s.trim()).map(Self).map_err(|e| invalid(s, e))
    }
}

impl FromStr for Gwei {
    type Err = SubmitterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_units(s.trim(), "gwei")
            .map(|units| Self(units.into()))
            .map_err(|e| invalid(s, e))
    }
}

impl FromStr for BaseUnits {
    type Err = SubmitterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        U256::from_dec_str(s.trim())
            .map(Self)
            .map_err(|e| invalid(s, e))
    }
}

impl fmt::Display for Ether {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_ether(self.0))
    }
}

impl fmt::Display for Gwei {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match format_units(self.0, "gwei") {
            Ok(s) => f.write_str(&s),
            Err(_) => write!(f, "{} wei", self.0),
        }
    }
}

impl fmt::Display for BaseUnits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

macro_rules! string_conversions {
    ($($ty:ty),*) => {
        $(
            impl TryFrom<String> for $ty {
                type Error = SubmitterError;

                fn try_from(value: String) -> Result<Self, Self::Error> {
                    value.parse()
                }
            }

            impl From<$ty> for String {
                fn from(value: $ty) -> String {
                    value.to_string()
                }
            }
        )*
    };
}

string_conversions!(Ether, Gwei, BaseUnits);
