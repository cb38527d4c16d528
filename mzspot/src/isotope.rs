//! Isotope envelope assignment.
//!
//! [`IsotopeEstimator`] groups co-eluting features into isotope envelopes, assigning each
//! member its isotope weight number, the id of its monoisotopic parent and the envelope's
//! charge. [`MsmsIsotopeRecognition`] applies the same logic to the peaks of a single
//! MS/MS spectrum.
use std::collections::HashMap;

use chemical_elements::isotopic_pattern::{
    BafflingRecursiveIsotopicPatternGenerator, TheoreticalIsotopicPattern,
};
use chemical_elements::{ChemicalComposition, ElementSpecification, PROTON};
use mzpeaks::prelude::*;
use tracing::{debug, trace};

use crate::feature::IonFeature;
use crate::params::IsotopeParameters;

/// The mass difference between carbon 13 and carbon 12
pub const C13_C12_DIFF: f64 = 1.003355;
/// The number of isotope traces followed beyond the monoisotopic peak
pub const MAX_ISOTOPE_TRACE: usize = 8;
/// The largest mass difference between a monoisotopic peak and a candidate isotope
const ISOTOPE_MASS_WINDOW: f64 = 8.1;
/// Above this mass, intensity ratios are checked against a simulated distribution
const SIMULATION_MASS_THRESHOLD: f64 = 800.0;
/// The largest difference between observed and simulated consecutive isotope ratios
const RATIO_TOLERANCE: f64 = 0.05;
/// The mass of a CH2 unit, used to size the alkane stand-in composition
const CH2_MASS: f64 = 14.01565;

/// A candidate envelope member, its position in the caller's list with mass and intensity
#[derive(Debug, Clone, Copy, PartialEq)]
struct Candidate {
    index: usize,
    mass: f64,
    intensity: f64,
}

/// The result of resolving one envelope
#[derive(Debug, Clone, PartialEq)]
struct Envelope {
    charge: u32,
    /// `(candidate index, isotope trace number)` pairs of accepted isotope peaks
    members: Vec<(usize, usize)>,
}

/// Charge and intensity based envelope assignment shared by the chromatographic and
/// MS/MS estimators
struct EnvelopeResolver {
    generator: BafflingRecursiveIsotopicPatternGenerator<'static>,
    cache: HashMap<(i32, u32), Vec<f64>>,
    tolerance: f64,
    max_charge: u32,
    consider_brcl: bool,
}

impl EnvelopeResolver {
    fn new(tolerance: f64, max_charge: u32, consider_brcl: bool) -> Self {
        Self {
            generator: BafflingRecursiveIsotopicPatternGenerator::new(),
            cache: HashMap::new(),
            tolerance,
            max_charge: max_charge.max(1),
            consider_brcl,
        }
    }

    /// The distance from the nearest candidate to `target`, if one lies within tolerance
    fn nearest(&self, candidates: &[Candidate], target: f64) -> Option<(usize, f64)> {
        candidates
            .iter()
            .enumerate()
            .map(|(i, c)| (i, (c.mass - target).abs()))
            .filter(|(_, d)| *d < self.tolerance)
            .min_by(|a, b| a.1.total_cmp(&b.1))
    }

    /// Find the charge whose first isotope spacing is matched by a candidate, preferring
    /// the largest charge but re-checking lower charges for high charge states
    fn estimate_charge(&self, mono_mass: f64, candidates: &[Candidate]) -> u32 {
        let fit = |k: u32| {
            self.nearest(candidates, mono_mass + C13_C12_DIFF / k as f64)
                .map(|(_, d)| d)
        };
        for k in (1..=self.max_charge).rev() {
            let Some(delta) = fit(k) else {
                continue;
            };
            let mut best = (k, delta);
            if k >= 4 {
                if let Some(d) = fit(k - 1) {
                    if d < best.1 {
                        best = (k - 1, d);
                    }
                }
            }
            if k >= 6 {
                if let Some(d) = fit(k - 2) {
                    if d < best.1 {
                        best = (k - 2, d);
                    }
                }
            }
            return best.0;
        }
        1
    }

    /// Simulated relative abundances of an alkane `CnH2n` of about `neutral_mass`
    fn simulated_abundances(&mut self, neutral_mass: f64, charge: u32) -> Option<&[f64]> {
        let carbons = ((neutral_mass / CH2_MASS).round() as i32).max(1);
        let key = (carbons, charge);
        if !self.cache.contains_key(&key) {
            let carbon = ElementSpecification::parse("C").ok()?;
            let hydrogen = ElementSpecification::parse("H").ok()?;
            let mut composition = ChemicalComposition::new();
            composition.set(carbon, carbons);
            composition.set(hydrogen, carbons * 2);
            let peaks = self
                .generator
                .isotopic_variants(composition, 0, charge as i32, PROTON);
            let pattern = TheoreticalIsotopicPattern::from(peaks);
            let abundances: Vec<f64> = pattern.iter().map(|p| p.intensity() as f64).collect();
            self.cache.insert(key, abundances);
        }
        self.cache.get(&key).map(|v| v.as_slice())
    }

    /// Walk the isotope traces of the envelope rooted at `mono`.
    ///
    /// # Arguments
    /// - `mono`: The monoisotopic peak candidate
    /// - `candidates`: Heavier candidates which may belong to the envelope
    fn resolve(&mut self, mono: Candidate, candidates: &[Candidate]) -> Envelope {
        let charge = self.estimate_charge(mono.mass, candidates);
        let neutral_mass = mono.mass * charge as f64;
        let simulated: Option<Vec<f64>> = if neutral_mass > SIMULATION_MASS_THRESHOLD {
            self.simulated_abundances(neutral_mass, charge)
                .map(|v| v.to_vec())
        } else {
            None
        };

        let mut members = Vec::new();
        let mut previous_intensity = mono.intensity;
        for trace in 1..=MAX_ISOTOPE_TRACE {
            let target = mono.mass + trace as f64 * C13_C12_DIFF / charge as f64;
            let Some((i, _)) = self.nearest(candidates, target) else {
                break;
            };
            let candidate = candidates[i];
            let accepted = if neutral_mass <= SIMULATION_MASS_THRESHOLD {
                self.consider_brcl || candidate.intensity <= previous_intensity
            } else {
                match simulated.as_deref() {
                    Some(sim) if trace < sim.len() && sim[trace - 1] > 0.0 && previous_intensity > 0.0 => {
                        let observed = candidate.intensity / previous_intensity;
                        let expected = sim[trace] / sim[trace - 1];
                        (observed - expected).abs() < RATIO_TOLERANCE
                    }
                    _ => false,
                }
            };
            if !accepted {
                break;
            }
            members.push((candidate.index, trace));
            previous_intensity = candidate.intensity;
        }
        Envelope { charge, members }
    }
}

/// Assigns isotope envelopes across co-eluting chromatographic features
pub struct IsotopeEstimator {
    params: IsotopeParameters,
    ion_mobility: bool,
    resolver: EnvelopeResolver,
}

impl IsotopeEstimator {
    pub fn new(params: IsotopeParameters) -> Self {
        let resolver = EnvelopeResolver::new(
            params.isotope_tolerance,
            params.max_charge_number,
            params.is_brcl_considered_for_isotopes,
        );
        Self {
            params,
            ion_mobility: false,
            resolver,
        }
    }

    /// Also require isotope partners to share a drift time
    pub fn with_ion_mobility(mut self, ion_mobility: bool) -> Self {
        self.ion_mobility = ion_mobility;
        self
    }

    /// Assign isotope weight numbers, parents and charges to `features` in place.
    ///
    /// Features which already carry an isotope assignment are left untouched, as are the
    /// candidates an envelope may draw from.
    pub fn assign_isotopes<T: IonFeature>(&mut self, features: &mut [T]) {
        let mut order: Vec<usize> = (0..features.len()).collect();
        order.sort_by(|a, b| features[*a].mass().total_cmp(&features[*b].mass()));

        let mut n_envelopes = 0usize;
        for (oi, &i) in order.iter().enumerate() {
            if features[i].character().is_isotope_assigned() {
                continue;
            }
            let mono = &features[i];
            let (mass, rt, drift) = (mono.mass(), mono.rt(), mono.drift_time());
            let mut candidates = Vec::new();
            for &j in order[oi + 1..].iter() {
                let other = &features[j];
                if other.mass() > mass + ISOTOPE_MASS_WINDOW {
                    break;
                }
                if other.character().is_isotope_assigned() {
                    continue;
                }
                if (other.rt() - rt).abs() > self.params.retention_time_margin {
                    continue;
                }
                if self.ion_mobility && (other.drift_time() - drift).abs() > self.params.drift_time_margin {
                    continue;
                }
                candidates.push(Candidate {
                    index: j,
                    mass: other.mass(),
                    intensity: other.intensity(),
                });
            }
            let envelope = self.resolver.resolve(
                Candidate {
                    index: i,
                    mass,
                    intensity: mono.intensity(),
                },
                &candidates,
            );

            let parent_id = features[i].feature_id() as i32;
            let character = features[i].character_mut();
            character.isotope_weight_number = 0;
            character.isotope_parent_peak_id = parent_id;
            character.charge = envelope.charge;
            if !envelope.members.is_empty() {
                n_envelopes += 1;
                trace!(
                    "Envelope at {mass:.4} with charge {} has {} isotopes",
                    envelope.charge,
                    envelope.members.len()
                );
            }
            for (j, trace_number) in envelope.members {
                let character = features[j].character_mut();
                character.isotope_weight_number = trace_number as i32;
                character.isotope_parent_peak_id = parent_id;
                character.charge = envelope.charge;
            }
        }
        debug!(
            "Assigned {n_envelopes} isotope envelopes over {} features",
            features.len()
        );
    }
}

/// A centroid peak of an MS/MS spectrum with its isotope annotation
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SpectrumPeak {
    pub mass: f64,
    pub intensity: f64,
    pub isotope_weight_number: i32,
    pub isotope_parent_peak_id: i32,
    pub charge: u32,
}

impl SpectrumPeak {
    pub fn new(mass: f64, intensity: f64) -> Self {
        Self {
            mass,
            intensity,
            isotope_weight_number: -1,
            isotope_parent_peak_id: -1,
            charge: 1,
        }
    }
}

impl<C: CentroidLike> From<&C> for SpectrumPeak {
    fn from(value: &C) -> Self {
        Self::new(value.mz(), value.intensity() as f64)
    }
}

/// Assigns isotope envelopes among the peaks of one MS/MS spectrum
pub struct MsmsIsotopeRecognition {
    resolver: EnvelopeResolver,
}

impl MsmsIsotopeRecognition {
    pub fn new(tolerance: f64, max_charge: u32, consider_brcl: bool) -> Self {
        Self {
            resolver: EnvelopeResolver::new(tolerance, max_charge, consider_brcl),
        }
    }

    /// Annotate `peaks` in place. Parent ids refer to positions in `peaks`.
    pub fn assign(&mut self, peaks: &mut [SpectrumPeak]) {
        let mut order: Vec<usize> = (0..peaks.len()).collect();
        order.sort_by(|a, b| peaks[*a].mass.total_cmp(&peaks[*b].mass));
        for (oi, &i) in order.iter().enumerate() {
            if peaks[i].isotope_weight_number >= 0 {
                continue;
            }
            let mass = peaks[i].mass;
            let candidates: Vec<Candidate> = order[oi + 1..]
                .iter()
                .take_while(|j| peaks[**j].mass <= mass + ISOTOPE_MASS_WINDOW)
                .filter(|j| peaks[**j].isotope_weight_number < 0)
                .map(|j| Candidate {
                    index: *j,
                    mass: peaks[*j].mass,
                    intensity: peaks[*j].intensity,
                })
                .collect();
            let envelope = self.resolver.resolve(
                Candidate {
                    index: i,
                    mass,
                    intensity: peaks[i].intensity,
                },
                &candidates,
            );
            peaks[i].isotope_weight_number = 0;
            peaks[i].isotope_parent_peak_id = i as i32;
            peaks[i].charge = envelope.charge;
            for (j, trace_number) in envelope.members {
                peaks[j].isotope_weight_number = trace_number as i32;
                peaks[j].isotope_parent_peak_id = i as i32;
                peaks[j].charge = envelope.charge;
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::chromatogram::{ChromXUnit, ChromXs};
    use crate::feature::ChromatogramPeakFeature;

    fn feature(peak_id: usize, mass: f64, height: f64, rt: f64) -> ChromatogramPeakFeature {
        ChromatogramPeakFeature {
            peak_id,
            mass,
            peak_height_top: height,
            chrom_xs_top: ChromXs::from_rt(rt, ChromXUnit::Min),
            ..Default::default()
        }
    }

    fn params() -> IsotopeParameters {
        IsotopeParameters {
            isotope_tolerance: 0.01,
            max_charge_number: 2,
            ..Default::default()
        }
    }

    #[test_log::test]
    fn test_single_isotope() {
        let mut features = vec![
            feature(0, 500.0, 1_000_000.0, 5.0),
            feature(1, 501.0034, 300_000.0, 5.0),
        ];
        IsotopeEstimator::new(params()).assign_isotopes(&mut features);
        let mono = &features[0].peak_character;
        assert_eq!(mono.isotope_weight_number, 0);
        assert_eq!(mono.charge, 1);
        let iso = &features[1].peak_character;
        assert_eq!(iso.isotope_weight_number, 1);
        assert_eq!(iso.isotope_parent_peak_id, 0);
        assert_eq!(iso.charge, 1);
    }

    #[test]
    fn test_doubly_charged_and_rt_window() {
        let mut features = vec![
            feature(0, 400.0, 10_000.0, 2.0),
            feature(1, 400.50168, 4_000.0, 2.01),
            feature(2, 401.00335, 1_000.0, 2.0),
            feature(3, 401.00335, 1_000.0, 3.0),
        ];
        IsotopeEstimator::new(params()).assign_isotopes(&mut features);
        assert_eq!(features[0].peak_character.charge, 2);
        assert_eq!(features[1].peak_character.isotope_weight_number, 1);
        assert_eq!(features[2].peak_character.isotope_weight_number, 2);
        assert_eq!(features[3].peak_character.isotope_weight_number, 0);
        assert_eq!(features[3].peak_character.isotope_parent_peak_id, 3);
    }

    #[test]
    fn test_monotone_rule_below_threshold() {
        let mut features = vec![
            feature(0, 300.0, 1000.0, 1.0),
            feature(1, 301.003355, 2000.0, 1.0),
        ];
        IsotopeEstimator::new(params()).assign_isotopes(&mut features);
        assert_eq!(features[1].peak_character.isotope_weight_number, 0);

        let mut features = vec![
            feature(0, 300.0, 1000.0, 1.0),
            feature(1, 301.003355, 2000.0, 1.0),
        ];
        let mut p = params();
        p.is_brcl_considered_for_isotopes = true;
        IsotopeEstimator::new(p).assign_isotopes(&mut features);
        assert_eq!(features[1].peak_character.isotope_weight_number, 1);
    }

    #[test]
    fn test_simulated_rule_above_threshold() {
        let mut resolver = EnvelopeResolver::new(0.01, 1, false);
        let sim = resolver.simulated_abundances(1200.0, 1).unwrap().to_vec();
        assert!(sim.len() > 2);
        let ratio = sim[1] / sim[0];
        let mono = Candidate {
            index: 0,
            mass: 1200.0,
            intensity: 1000.0,
        };
        let matching = [Candidate {
            index: 1,
            mass: 1201.003355,
            intensity: 1000.0 * ratio,
        }];
        let envelope = resolver.resolve(mono, &matching);
        assert_eq!(envelope.members, vec![(1, 1)]);

        let mismatching = [Candidate {
            index: 1,
            mass: 1201.003355,
            intensity: 1000.0 * (ratio + 0.2),
        }];
        let envelope = resolver.resolve(mono, &mismatching);
        assert!(envelope.members.is_empty());
    }

    #[test]
    fn test_msms_recognition() {
        let mut peaks = vec![
            SpectrumPeak::new(201.0034, 200.0),
            SpectrumPeak::new(200.0, 1000.0),
            SpectrumPeak::new(150.0, 500.0),
        ];
        MsmsIsotopeRecognition::new(0.01, 1, false).assign(&mut peaks);
        assert_eq!(peaks[1].isotope_weight_number, 0);
        assert_eq!(peaks[0].isotope_weight_number, 1);
        assert_eq!(peaks[0].isotope_parent_peak_id, 1);
        assert_eq!(peaks[2].isotope_weight_number, 0);
    }
}
