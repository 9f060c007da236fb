//! Landmark zoning: locates the space bar, OS key, left Shift, top-left letter
//! and Enter among the extracted regions.
//!
//! The space bar is the origin. Every other landmark is searched in a vertical
//! corridor expressed in multiples of `h_ref`, the median key height, so the
//! search does not depend on image scale. Each "pick one of many" step ranks
//! candidates by a single scalar and breaks exact ties by position, so the
//! result does not depend on the order regions arrive in.

use serde::Serialize;
use std::cmp::Ordering;
use tracing::{debug, info};

use crate::config::ZoningConfig;
use crate::region::KeyRegion;
use crate::stats;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Landmark {
    Space,
    Shift,
    TlLetter,
    OsKey,
    EnterKey,
}

impl Landmark {
    pub const ALL: [Landmark; 5] = [
        Landmark::Space,
        Landmark::Shift,
        Landmark::TlLetter,
        Landmark::OsKey,
        Landmark::EnterKey,
    ];
}

impl std::fmt::Display for Landmark {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Landmark::Space => "SPACE",
            Landmark::Shift => "SHIFT",
            Landmark::TlLetter => "TL_LETTER",
            Landmark::OsKey => "OS_KEY",
            Landmark::EnterKey => "ENTER_KEY",
        };
        f.write_str(name)
    }
}

/// Landmarks found in one image. Only the space bar is guaranteed.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LandmarkMap {
    pub space: KeyRegion,
    pub shift: Option<KeyRegion>,
    pub tl_letter: Option<KeyRegion>,
    pub os_key: Option<KeyRegion>,
    pub enter_key: Option<KeyRegion>,
    /// Median key height over all regions, the unit of every corridor
    pub h_ref: f64,
    /// The top-left letter came from the north-west fallback, not the corridor
    pub tl_letter_approximate: bool,
    /// The leftmost corridor key looked like Tab and was skipped
    pub tab_skipped: bool,
}

impl LandmarkMap {
    pub fn get(&self, landmark: Landmark) -> Option<&KeyRegion> {
        match landmark {
            Landmark::Space => Some(&self.space),
            Landmark::Shift => self.shift.as_ref(),
            Landmark::TlLetter => self.tl_letter.as_ref(),
            Landmark::OsKey => self.os_key.as_ref(),
            Landmark::EnterKey => self.enter_key.as_ref(),
        }
    }

    /// Landmarks that were searched for but not found.
    pub fn missing(&self) -> Vec<Landmark> {
        Landmark::ALL
            .into_iter()
            .filter(|&l| self.get(l).is_none())
            .collect()
    }

    pub fn found_count(&self) -> usize {
        Landmark::ALL.len() - self.missing().len()
    }
}

/// Median of the region heights.
pub fn reference_height(regions: &[KeyRegion]) -> f64 {
    let heights: Vec<f64> = regions.iter().map(|r| r.height() as f64).collect();
    stats::median(&heights)
}

/// Total order on region placement, used to settle exact ranking ties.
fn position_order(a: &KeyRegion, b: &KeyRegion) -> Ordering {
    let key = |r: &KeyRegion| (r.bbox.min_row, r.bbox.min_col, r.bbox.max_row, r.bbox.max_col);
    key(a).cmp(&key(b))
}

/// Candidate with the largest `key`; ties go to the top-most, then left-most region.
fn rank_max<'a, I, F>(candidates: I, key: F) -> Option<&'a KeyRegion>
where
    I: IntoIterator<Item = &'a KeyRegion>,
    F: Fn(&KeyRegion) -> f64,
{
    candidates
        .into_iter()
        .max_by(|a, b| key(a).total_cmp(&key(b)).then_with(|| position_order(b, a)))
}

/// Candidate with the smallest `key`; ties go to the top-most, then left-most region.
fn rank_min<'a, I, F>(candidates: I, key: F) -> Option<&'a KeyRegion>
where
    I: IntoIterator<Item = &'a KeyRegion>,
    F: Fn(&KeyRegion) -> f64,
{
    candidates
        .into_iter()
        .min_by(|a, b| key(a).total_cmp(&key(b)).then_with(|| position_order(a, b)))
}

/// Locates the landmark keys. Returns None when there are no regions.
pub fn locate_landmarks(regions: &[KeyRegion], config: &ZoningConfig) -> Option<LandmarkMap> {
    // 1. Space bar: the largest key on any standard keyboard
    let space = rank_max(regions, |r| r.area as f64)?;
    let (cy_space, cx_space) = space.centroid;
    let w_space = space.width() as f64;

    // 2. Reference height over every region, robust to the space bar itself
    let h_ref = reference_height(regions);
    info!(
        "Space: y={:.0} x={:.0} w={:.0} | reference key height h_ref={:.1}px",
        cy_space, cx_space, w_space, h_ref
    );

    let others = || regions.iter().filter(move |r| !std::ptr::eq(*r, space));
    let offset = |r: &KeyRegion| (r.center_row() - cy_space, r.center_col() - cx_space);

    // 3. OS key: same row as space, immediately to its left
    let os_dx_min = -(w_space / 2.0 + config.os_dx_margin_px);
    let os_dx_max = -(w_space / 2.0 * config.os_dx_min_fraction);
    let os_key = rank_max(
        others().filter(|r| {
            let (dy, dx) = offset(r);
            dy.abs() < h_ref * config.os_dy_tolerance && dx > os_dx_min && dx < os_dx_max
        }),
        |r| r.center_col(),
    );

    // 4. Left shift: one row up, left of the space centre, the largest key there
    let shift = rank_max(
        others().filter(|r| {
            let (dy, _) = offset(r);
            dy > -(h_ref * config.shift_y_max_hr)
                && dy < -(h_ref * config.shift_y_min_hr)
                && r.center_col() < cx_space
        }),
        |r| r.area as f64,
    );

    // 5. Top-left letter (Q or A): third row up, leftmost non-Tab key
    let mut letter_row: Vec<&KeyRegion> = others()
        .filter(|r| {
            let (dy, _) = offset(r);
            dy > -(h_ref * config.tl_letter_y_max_hr) && dy < -(h_ref * config.tl_letter_y_min_hr)
        })
        .collect();
    letter_row.sort_by(|a, b| {
        a.center_col()
            .total_cmp(&b.center_col())
            .then_with(|| position_order(a, b))
    });

    let mut tab_skipped = false;
    let mut tl_letter = match letter_row.as_slice() {
        [] => None,
        [first, second, ..] if first.aspect_ratio() > config.tab_ratio_min => {
            debug!(
                "Leftmost key of the letter row looks like Tab (w/h={:.2}), using the next one",
                first.aspect_ratio()
            );
            tab_skipped = true;
            Some(*second)
        }
        [first, ..] => Some(*first),
    };

    let mut tl_letter_approximate = false;
    if tl_letter.is_none() {
        tl_letter = rank_min(regions, |r| r.center_row() + r.center_col());
        tl_letter_approximate = tl_letter.is_some();
        info!("No key in the top-left letter corridor, falling back to the north-west-most region");
    }

    // 6. Enter: right of the space centre, near a fixed height above space
    let enter_key = if config.detect_enter {
        let target = -(h_ref * config.enter_y_target_hr);
        let tolerance = h_ref * config.enter_y_tolerance_hr;
        rank_max(
            others().filter(|r| {
                let (dy, _) = offset(r);
                (dy - target).abs() <= tolerance && r.center_col() > cx_space
            }),
            |r| r.area as f64,
        )
    } else {
        None
    };

    let map = LandmarkMap {
        space: space.clone(),
        shift: shift.cloned(),
        tl_letter: tl_letter.cloned(),
        os_key: os_key.cloned(),
        enter_key: enter_key.cloned(),
        h_ref,
        tl_letter_approximate,
        tab_skipped,
    };

    debug!(
        "Zoning found {}/{} landmarks (missing: {:?})",
        map.found_count(),
        Landmark::ALL.len(),
        map.missing()
    );

    Some(map)
}
