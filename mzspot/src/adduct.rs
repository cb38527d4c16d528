//! Adduct ion notation, e.g. `[M+H]+`, `[2M+Na]+` or `[M-H2O-H]-`, and the conversion
//! between observed m/z and neutral mass it implies.
use std::fmt::Display;
use std::str::FromStr;

use thiserror::Error;

use crate::params::IonMode;

/// The mass of an electron in Da
pub const ELECTRON: f64 = 0.00054858;

/// Neutral monoisotopic masses of the terms recognized in adduct notation
const TERM_MASSES: &[(&str, f64)] = &[
    ("H", 1.00782503207),
    ("Li", 7.016004548),
    ("NH4", 18.033825568),
    ("Na", 22.98976928),
    ("K", 38.96370668),
    ("H2O", 18.010564684),
    ("Cl", 34.96885268),
    ("Br", 78.9183371),
    ("HCOO", 44.997654),
    ("CH3COO", 59.013304),
    ("FA", 46.005479308),
    ("Hac", 60.021129372),
    ("ACN", 41.026549101),
    ("CH3OH", 32.026214748),
    ("MeOH", 32.026214748),
    ("DMSO", 78.013935812),
    ("NH3", 17.026549101),
    ("CO2", 43.989829244),
    ("Fe", 55.9349375),
    ("Ca", 39.9625909),
];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AdductParseError {
    #[error("Adduct notation {0:?} must be enclosed in square brackets")]
    MissingBrackets(String),
    #[error("Adduct notation {0:?} does not contain the molecule symbol M")]
    MissingMolecule(String),
    #[error("Unknown adduct term {term:?} in {notation:?}")]
    UnknownTerm { notation: String, term: String },
    #[error("Malformed charge state {0:?}")]
    MalformedCharge(String),
}

/// A parsed adduct ion type.
///
/// `adduct_mass` is the net neutral mass added to the `x_mer` molecules before the charge
/// carriers' electrons are accounted for.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AdductIon {
    pub name: String,
    pub x_mer: u32,
    pub adduct_mass: f64,
    pub charge: u32,
    pub ion_mode: IonMode,
}

impl Default for AdductIon {
    fn default() -> Self {
        Self::protonated()
    }
}

impl AdductIon {
    pub fn protonated() -> Self {
        Self {
            name: "[M+H]+".to_string(),
            x_mer: 1,
            adduct_mass: TERM_MASSES[0].1,
            charge: 1,
            ion_mode: IonMode::Positive,
        }
    }

    pub fn deprotonated() -> Self {
        Self {
            name: "[M-H]-".to_string(),
            x_mer: 1,
            adduct_mass: -TERM_MASSES[0].1,
            charge: 1,
            ion_mode: IonMode::Negative,
        }
    }

    /// The default adduct for an ionization polarity
    pub fn default_for(ion_mode: IonMode) -> Self {
        match ion_mode {
            IonMode::Positive => Self::protonated(),
            IonMode::Negative => Self::deprotonated(),
        }
    }

    /// The adduct `[M+zH]z+` or `[M-zH]z-` for a multiply charged ion
    pub fn multiply_charged(charge: u32, ion_mode: IonMode) -> Self {
        let charge = charge.max(1);
        let h = TERM_MASSES[0].1 * charge as f64;
        let (name, adduct_mass) = match (ion_mode, charge) {
            (IonMode::Positive, 1) => ("[M+H]+".to_string(), h),
            (IonMode::Negative, 1) => ("[M-H]-".to_string(), -h),
            (IonMode::Positive, z) => (format!("[M+{z}H]{z}+"), h),
            (IonMode::Negative, z) => (format!("[M-{z}H]{z}-"), -h),
        };
        Self {
            name,
            x_mer: 1,
            adduct_mass,
            charge,
            ion_mode,
        }
    }

    fn charge_sign(&self) -> f64 {
        match self.ion_mode {
            IonMode::Positive => 1.0,
            IonMode::Negative => -1.0,
        }
    }

    /// Convert a neutral mass into the m/z of this adduct ion
    pub fn to_mz(&self, neutral_mass: f64) -> f64 {
        let z = self.charge as f64;
        (self.x_mer as f64 * neutral_mass + self.adduct_mass - self.charge_sign() * z * ELECTRON)
            / z
    }

    /// Convert an observed m/z into the neutral mass of the molecule
    pub fn to_neutral_mass(&self, mz: f64) -> f64 {
        let z = self.charge as f64;
        (mz * z - self.adduct_mass + self.charge_sign() * z * ELECTRON) / self.x_mer as f64
    }

    pub fn is_multimer(&self) -> bool {
        self.x_mer > 1
    }
}

impl Display for AdductIon {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name)
    }
}

fn term_mass(term: &str) -> Option<f64> {
    TERM_MASSES
        .iter()
        .find(|(name, _)| *name == term)
        .map(|(_, m)| *m)
}

/// Split a leading decimal multiplier off a term, `"2H"` becomes `(2, "H")`
fn split_count(term: &str) -> (u32, &str) {
    let digits = term.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits == 0 {
        (1, term)
    } else {
        (term[..digits].parse().unwrap_or(1), &term[digits..])
    }
}

impl FromStr for AdductIon {
    type Err = AdductParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let notation = s.trim();
        let (body, charge_part) = match (notation.find('['), notation.rfind(']')) {
            (Some(0), Some(end)) => (&notation[1..end], &notation[end + 1..]),
            _ => return Err(AdductParseError::MissingBrackets(s.to_string())),
        };

        let (ion_mode, digits) = if let Some(d) = charge_part.strip_suffix('+') {
            (IonMode::Positive, d)
        } else if let Some(d) = charge_part.strip_suffix('-') {
            (IonMode::Negative, d)
        } else {
            return Err(AdductParseError::MalformedCharge(charge_part.to_string()));
        };
        let charge: u32 = if digits.is_empty() {
            1
        } else {
            digits
                .parse()
                .map_err(|_| AdductParseError::MalformedCharge(charge_part.to_string()))?
        };
        if charge == 0 {
            return Err(AdductParseError::MalformedCharge(charge_part.to_string()));
        }

        let m_pos = body
            .find('M')
            .ok_or_else(|| AdductParseError::MissingMolecule(s.to_string()))?;
        let x_mer = if m_pos == 0 {
            1
        } else {
            body[..m_pos]
                .parse()
                .map_err(|_| AdductParseError::MissingMolecule(s.to_string()))?
        };

        let mut adduct_mass = 0.0;
        let rest = &body[m_pos + 1..];
        let mut sign = 0.0;
        let mut start = 0;
        for (i, c) in rest.char_indices().chain(std::iter::once((rest.len(), '+'))) {
            if c != '+' && c != '-' {
                continue;
            }
            if i > start {
                let (count, name) = split_count(&rest[start..i]);
                let mass = term_mass(name).ok_or_else(|| AdductParseError::UnknownTerm {
                    notation: s.to_string(),
                    term: name.to_string(),
                })?;
                adduct_mass += sign * count as f64 * mass;
            } else if sign != 0.0 {
                return Err(AdductParseError::UnknownTerm {
                    notation: s.to_string(),
                    term: String::new(),
                });
            }
            sign = if c == '+' { 1.0 } else { -1.0 };
            start = i + 1;
        }

        Ok(Self {
            name: notation.to_string(),
            x_mer,
            adduct_mass,
            charge,
            ion_mode,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_parse_protonated() {
        let adduct: AdductIon = "[M+H]+".parse().unwrap();
        assert_eq!(adduct.x_mer, 1);
        assert_eq!(adduct.charge, 1);
        assert_eq!(adduct.ion_mode, IonMode::Positive);
        let mz = adduct.to_mz(180.06339);
        assert!((mz - 181.070666).abs() < 1e-5, "{mz}");
        assert!((adduct.to_neutral_mass(mz) - 180.06339).abs() < 1e-9);
    }

    #[test]
    fn test_parse_complex() {
        let adduct: AdductIon = "[2M+Na]+".parse().unwrap();
        assert_eq!(adduct.x_mer, 2);
        assert!((adduct.to_mz(100.0) - (200.0 + 22.98976928 - ELECTRON)).abs() < 1e-9);

        let adduct: AdductIon = "[M-H2O+H]+".parse().unwrap();
        assert!((adduct.adduct_mass - (1.00782503207 - 18.010564684)).abs() < 1e-9);

        let adduct: AdductIon = "[M+2H]2+".parse().unwrap();
        assert_eq!(adduct.charge, 2);
        assert!((adduct.to_mz(1000.0) - (1000.0 + 2.0 * 1.00782503207 - 2.0 * ELECTRON) / 2.0).abs() < 1e-9);

        let adduct: AdductIon = "[M+HCOO]-".parse().unwrap();
        assert_eq!(adduct.ion_mode, IonMode::Negative);
        assert!((adduct.to_mz(100.0) - (100.0 + 44.997654 + ELECTRON)).abs() < 1e-9);
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(
            "M+H".parse::<AdductIon>(),
            Err(AdductParseError::MissingBrackets(_))
        ));
        assert!(matches!(
            "[M+Xx]+".parse::<AdductIon>(),
            Err(AdductParseError::UnknownTerm { .. })
        ));
        assert!(matches!(
            "[M+H]".parse::<AdductIon>(),
            Err(AdductParseError::MalformedCharge(_))
        ));
    }

    #[test]
    fn test_multiply_charged() {
        let a = AdductIon::multiply_charged(3, IonMode::Negative);
        assert_eq!(a.name, "[M-3H]3-");
        let b: AdductIon = a.name.parse().unwrap();
        assert!((a.adduct_mass - b.adduct_mass).abs() < 1e-9);
        assert_eq!(b.charge, 3);
    }
}
