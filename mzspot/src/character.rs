//! Peak character estimation: adduct annotation, adduct ancestry and peak grouping.
//!
//! Features are treated as an arena addressed by peak id, with [`LinkedPeakFeature`] edges
//! between them. All traversals are iterative.
use std::collections::{HashMap, HashSet, VecDeque};

use identity_hash::BuildIdentityHasher;
use tracing::{debug, warn};

use crate::adduct::AdductIon;
use crate::feature::{IonFeature, LinkedPeakFeature, PeakLinkKind};
use crate::params::{CharacterParameters, IonMode};

type IdIndex = HashMap<usize, usize, BuildIdentityHasher<usize>>;
type IdSet = HashSet<usize, BuildIdentityHasher<usize>>;

/// Per-feature data for the optional cross-linking passes, keyed by peak id
#[derive(Debug, Default, Clone, Copy)]
pub struct LinkingContext<'a> {
    /// Fragment m/z values of the MS2 spectrum linked to each feature
    pub ms2_fragments: Option<&'a HashMap<usize, Vec<f64>>>,
    /// The neutral mass of the compound each identified feature was annotated with
    pub identified_masses: Option<&'a HashMap<usize, f64>>,
}

/// Counts of what a character estimation pass did
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CharacterSummary {
    pub n_groups: usize,
    pub n_isotope_links: usize,
    pub n_adduct_links: usize,
    pub n_correlation_links: usize,
    pub n_msms_links: usize,
}

#[derive(Debug, Clone)]
pub struct PeakCharacterEstimator {
    params: CharacterParameters,
    ion_mode: IonMode,
    retention_time_tolerance: f64,
}

impl PeakCharacterEstimator {
    pub fn new(params: CharacterParameters, ion_mode: IonMode) -> Self {
        Self {
            params,
            ion_mode,
            retention_time_tolerance: 0.03,
        }
    }

    /// The largest apex distance at which two features are considered co-eluting
    pub fn with_retention_time_tolerance(mut self, tolerance: f64) -> Self {
        self.retention_time_tolerance = tolerance;
        self
    }

    /// Parse the configured adduct list, falling back to the default adduct of the ion mode
    pub fn searched_adducts(&self) -> Vec<AdductIon> {
        let mut adducts: Vec<AdductIon> = self
            .params
            .searched_adducts
            .iter()
            .filter_map(|s| match s.parse::<AdductIon>() {
                Ok(a) if a.ion_mode == self.ion_mode => Some(a),
                Ok(a) => {
                    debug!("Skipping adduct {a} which does not match ion mode {}", self.ion_mode);
                    None
                }
                Err(e) => {
                    warn!("Skipping adduct: {e}");
                    None
                }
            })
            .collect();
        if adducts.is_empty() {
            adducts.push(AdductIon::default_for(self.ion_mode));
        }
        adducts
    }

    pub fn assign_character<T: IonFeature>(
        &self,
        features: &mut [T],
        searched_adducts: &[AdductIon],
    ) -> CharacterSummary {
        self.assign_character_with(features, searched_adducts, LinkingContext::default())
    }

    /// Annotate `features` in place.
    ///
    /// # Arguments
    /// - `features`: The features of one sample or the spots of one alignment
    /// - `searched_adducts`: The adducts to annotate with, most preferred first
    /// - `context`: Extra per-feature data used by the optional linking passes
    pub fn assign_character_with<T: IonFeature>(
        &self,
        features: &mut [T],
        searched_adducts: &[AdductIon],
        context: LinkingContext<'_>,
    ) -> CharacterSummary {
        let mut summary = CharacterSummary::default();
        let index = build_index(features);

        if self.params.link_identified_compounds {
            if let Some(identified) = context.identified_masses {
                summary.n_adduct_links +=
                    self.link_identified_compounds(features, &index, searched_adducts, identified);
            }
        }
        if self.params.link_adduct_pairs {
            summary.n_adduct_links += self.link_adduct_pairs(features, searched_adducts);
        }
        if self.params.link_chromatogram_correlation {
            summary.n_correlation_links += self.link_chromatogram_correlation(features);
        }
        if self.params.link_ms1_ms2_partial_match {
            if let Some(fragments) = context.ms2_fragments {
                summary.n_msms_links += self.link_ms1_ms2_partial_match(features, fragments);
            }
        }

        self.assign_default_adducts(features, searched_adducts);
        summary.n_isotope_links = link_isotopes(features, &index);
        resolve_adduct_parents(features, &index);
        summary.n_groups = assign_peak_groups(features, &index);
        debug!(
            "Character estimation over {} features: {summary:?}",
            features.len()
        );
        summary
    }

    /// Give un-annotated root peaks the preferred adduct, or a multiply charged proton
    /// adduct for charges above one
    fn assign_default_adducts<T: IonFeature>(&self, features: &mut [T], searched_adducts: &[AdductIon]) {
        let default = searched_adducts
            .first()
            .cloned()
            .unwrap_or_else(|| AdductIon::default_for(self.ion_mode));
        for f in features.iter_mut() {
            let id = f.feature_id() as i32;
            let character = f.character_mut();
            if character.adduct_parent < 0 {
                character.adduct_parent = id;
            }
            if character.isotope_weight_number > 0 || character.adduct_type.is_some() {
                continue;
            }
            character.adduct_type = Some(if character.charge >= 2 {
                AdductIon::multiply_charged(character.charge, self.ion_mode)
            } else {
                default.clone()
            });
        }
    }

    fn co_eluting<T: IonFeature>(&self, a: &T, b: &T) -> bool {
        (a.rt() - b.rt()).abs() <= self.retention_time_tolerance
    }

    /// Link features whose m/z is explained by a searched adduct of an identified
    /// compound's neutral mass to that identified feature
    fn link_identified_compounds<T: IonFeature>(
        &self,
        features: &mut [T],
        index: &IdIndex,
        searched_adducts: &[AdductIon],
        identified: &HashMap<usize, f64>,
    ) -> usize {
        let tolerance = self.params.adduct_tolerance;
        let mut n_links = 0;
        for (&peak_id, &neutral_mass) in identified.iter() {
            let Some(&i) = index.get(&peak_id) else {
                continue;
            };
            if let Some(own) = searched_adducts
                .iter()
                .find(|a| (a.to_mz(neutral_mass) - features[i].mass()).abs() < tolerance)
            {
                let c = features[i].character_mut();
                c.adduct_type = Some(own.clone());
                c.adduct_parent = peak_id as i32;
            }
            for j in 0..features.len() {
                if i == j || !self.co_eluting(&features[i], &features[j]) {
                    continue;
                }
                let mass = features[j].mass();
                let Some(adduct) = searched_adducts
                    .iter()
                    .find(|a| (a.to_mz(neutral_mass) - mass).abs() < tolerance)
                else {
                    continue;
                };
                let other_id = features[j].feature_id();
                let c = features[j].character_mut();
                c.adduct_type = Some(adduct.clone());
                c.adduct_parent = peak_id as i32;
                c.add_link(LinkedPeakFeature::new(peak_id, PeakLinkKind::Adduct));
                features[i]
                    .character_mut()
                    .add_link(LinkedPeakFeature::new(other_id, PeakLinkKind::Adduct));
                n_links += 1;
            }
        }
        n_links
    }

    /// Pair co-eluting root peaks whose neutral masses agree under two different searched
    /// adducts. The peak annotated with the more preferred adduct becomes the parent.
    fn link_adduct_pairs<T: IonFeature>(&self, features: &mut [T], searched_adducts: &[AdductIon]) -> usize {
        let tolerance = self.params.adduct_tolerance;
        let mut n_links = 0;
        let n = features.len();
        for i in 0..n {
            if features[i].character().isotope_weight_number > 0 {
                continue;
            }
            for j in i + 1..n {
                if features[j].character().isotope_weight_number > 0
                    || !self.co_eluting(&features[i], &features[j])
                {
                    continue;
                }
                let (mi, mj) = (features[i].mass(), features[j].mass());
                let mut found = None;
                'search: for (ai, a) in searched_adducts.iter().enumerate() {
                    for (bi, b) in searched_adducts.iter().enumerate() {
                        if ai == bi {
                            continue;
                        }
                        let neutral_a = a.to_neutral_mass(mi);
                        let neutral_b = b.to_neutral_mass(mj);
                        if (neutral_a - neutral_b).abs() < tolerance {
                            found = Some((ai, bi));
                            break 'search;
                        }
                    }
                }
                let Some((ai, bi)) = found else {
                    continue;
                };
                let (id_i, id_j) = (features[i].feature_id(), features[j].feature_id());
                let (parent, child) = if ai < bi { (id_i, id_j) } else { (id_j, id_i) };
                {
                    let c = features[i].character_mut();
                    c.adduct_type = Some(searched_adducts[ai].clone());
                    c.add_link(LinkedPeakFeature::new(id_j, PeakLinkKind::Adduct));
                    if id_i == child {
                        c.adduct_parent = parent as i32;
                    }
                }
                {
                    let c = features[j].character_mut();
                    c.adduct_type = Some(searched_adducts[bi].clone());
                    c.add_link(LinkedPeakFeature::new(id_i, PeakLinkKind::Adduct));
                    if id_j == child {
                        c.adduct_parent = parent as i32;
                    }
                }
                n_links += 1;
            }
        }
        n_links
    }

    /// Link co-eluting features whose modelled elution profiles correlate above the
    /// configured threshold
    fn link_chromatogram_correlation<T: IonFeature>(&self, features: &mut [T]) -> usize {
        let mut n_links = 0;
        let n = features.len();
        for i in 0..n {
            for j in i + 1..n {
                if !self.co_eluting(&features[i], &features[j]) {
                    continue;
                }
                let r = profile_correlation(features[i].rt_span(), features[i].rt(), features[j].rt_span(), features[j].rt());
                if r < self.params.correlation_threshold {
                    continue;
                }
                let (id_i, id_j) = (features[i].feature_id(), features[j].feature_id());
                features[i]
                    .character_mut()
                    .add_link(LinkedPeakFeature::new(id_j, PeakLinkKind::ChromSimilar));
                features[j]
                    .character_mut()
                    .add_link(LinkedPeakFeature::new(id_i, PeakLinkKind::ChromSimilar));
                n_links += 1;
            }
        }
        n_links
    }

    /// Link a feature to a heavier co-eluting feature whose MS2 spectrum contains it as a
    /// fragment, marking in-source fragments
    fn link_ms1_ms2_partial_match<T: IonFeature>(
        &self,
        features: &mut [T],
        fragments: &HashMap<usize, Vec<f64>>,
    ) -> usize {
        let tolerance = self.params.adduct_tolerance;
        let mut n_links = 0;
        let n = features.len();
        for upper in 0..n {
            let upper_id = features[upper].feature_id();
            let Some(frags) = fragments.get(&upper_id) else {
                continue;
            };
            for lower in 0..n {
                if lower == upper
                    || features[lower].mass() >= features[upper].mass()
                    || !self.co_eluting(&features[lower], &features[upper])
                {
                    continue;
                }
                let mass = features[lower].mass();
                if !frags.iter().any(|f| (f - mass).abs() < tolerance) {
                    continue;
                }
                let lower_id = features[lower].feature_id();
                features[lower]
                    .character_mut()
                    .add_link(LinkedPeakFeature::new(upper_id, PeakLinkKind::FoundInUpperMsMs));
                features[upper]
                    .character_mut()
                    .add_link(LinkedPeakFeature::new(lower_id, PeakLinkKind::FoundInUpperMsMs));
                n_links += 1;
            }
        }
        n_links
    }
}

fn build_index<T: IonFeature>(features: &[T]) -> IdIndex {
    let mut index = IdIndex::default();
    for (i, f) in features.iter().enumerate() {
        index.insert(f.feature_id(), i);
    }
    index
}

/// Add isotope links between isotope peaks and their monoisotopic parents, and copy the
/// parent's adduct down to each isotope
fn link_isotopes<T: IonFeature>(features: &mut [T], index: &IdIndex) -> usize {
    let mut n_links = 0;
    for i in 0..features.len() {
        let character = features[i].character();
        if character.isotope_weight_number <= 0 || character.isotope_parent_peak_id < 0 {
            continue;
        }
        let parent_id = character.isotope_parent_peak_id as usize;
        let Some(&p) = index.get(&parent_id) else {
            continue;
        };
        if p == i {
            continue;
        }
        let child_id = features[i].feature_id();
        let (adduct, adduct_parent) = {
            let parent = features[p].character();
            (parent.adduct_type.clone(), parent.adduct_parent)
        };
        features[p]
            .character_mut()
            .add_link(LinkedPeakFeature::new(child_id, PeakLinkKind::Isotope));
        let c = features[i].character_mut();
        c.add_link(LinkedPeakFeature::new(parent_id, PeakLinkKind::Isotope));
        if adduct.is_some() {
            c.adduct_type = adduct;
        }
        c.adduct_parent = if adduct_parent >= 0 {
            adduct_parent
        } else {
            parent_id as i32
        };
        n_links += 1;
    }
    n_links
}

/// Point every feature's adduct parent at the root of its ancestry chain. A chain that
/// loops back on itself is rooted at the smallest peak id of the loop.
fn resolve_adduct_parents<T: IonFeature>(features: &mut [T], index: &IdIndex) {
    for start in 0..features.len() {
        let mut path: Vec<usize> = Vec::new();
        let mut seen = IdSet::default();
        let mut current = features[start].feature_id();
        let root = loop {
            path.push(current);
            seen.insert(current);
            let parent = match index.get(&current) {
                Some(&i) => features[i].character().adduct_parent,
                None => break current,
            };
            if parent < 0 || parent as usize == current || !index.contains_key(&(parent as usize)) {
                break current;
            }
            let parent = parent as usize;
            if seen.contains(&parent) {
                let pos = path.iter().position(|p| *p == parent).unwrap_or(0);
                break path[pos..].iter().copied().min().unwrap_or(parent);
            }
            current = parent;
        };
        if let Some(&r) = index.get(&root) {
            features[r].character_mut().adduct_parent = root as i32;
        }
        for id in path {
            if let Some(&i) = index.get(&id) {
                features[i].character_mut().adduct_parent = root as i32;
            }
        }
    }
}

/// Assign a dense group id to every connected component of the link graph, returning the
/// number of groups
fn assign_peak_groups<T: IonFeature>(features: &mut [T], index: &IdIndex) -> usize {
    let n = features.len();
    let mut adjacency: Vec<Vec<usize>> = vec![Vec::new(); n];
    for (i, f) in features.iter().enumerate() {
        for link in f.character().peak_links.iter() {
            if let Some(&j) = index.get(&link.linked_peak_id) {
                if i != j {
                    adjacency[i].push(j);
                    adjacency[j].push(i);
                }
            }
        }
    }

    let mut visited = vec![false; n];
    let mut group_id = 0;
    for start in 0..n {
        if visited[start] {
            continue;
        }
        let mut queue = VecDeque::from(vec![start]);
        visited[start] = true;
        while let Some(node) = queue.pop_front() {
            features[node].character_mut().peak_group_id = group_id as i32;
            for &next in adjacency[node].iter() {
                if !visited[next] {
                    visited[next] = true;
                    queue.push_back(next);
                }
            }
        }
        group_id += 1;
    }
    group_id
}

/// The Pearson correlation of two triangular elution profiles spanning `a` and `b` with
/// the given apexes, sampled over the union of the two spans
fn profile_correlation(a: (f64, f64), apex_a: f64, b: (f64, f64), apex_b: f64) -> f64 {
    const N_SAMPLES: usize = 41;
    let lo = a.0.min(b.0);
    let hi = a.1.max(b.1);
    if hi <= lo {
        return 0.0;
    }
    let triangle = |x: f64, span: (f64, f64), apex: f64| {
        if x < span.0 || x > span.1 {
            0.0
        } else if x <= apex {
            if apex > span.0 {
                (x - span.0) / (apex - span.0)
            } else {
                1.0
            }
        } else if span.1 > apex {
            (span.1 - x) / (span.1 - apex)
        } else {
            1.0
        }
    };
    let xs: Vec<f64> = (0..N_SAMPLES)
        .map(|i| lo + (hi - lo) * i as f64 / (N_SAMPLES - 1) as f64)
        .collect();
    let ya: Vec<f64> = xs.iter().map(|x| triangle(*x, a, apex_a)).collect();
    let yb: Vec<f64> = xs.iter().map(|x| triangle(*x, b, apex_b)).collect();
    let mean_a = ya.iter().sum::<f64>() / N_SAMPLES as f64;
    let mean_b = yb.iter().sum::<f64>() / N_SAMPLES as f64;
    let mut cov = 0.0;
    let mut var_a = 0.0;
    let mut var_b = 0.0;
    for (p, q) in ya.iter().zip(yb.iter()) {
        cov += (p - mean_a) * (q - mean_b);
        var_a += (p - mean_a).powi(2);
        var_b += (q - mean_b).powi(2);
    }
    if var_a <= 0.0 || var_b <= 0.0 {
        0.0
    } else {
        cov / (var_a * var_b).sqrt()
    }
}
