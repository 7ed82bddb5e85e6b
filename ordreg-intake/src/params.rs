//! Tunable pipeline parameters
//!
//! Resolved from the settings table with compiled defaults. Retuning
//! changes constants only; the fusion shape (monotonic, fail-closed)
//! and tier ordering are fixed in code.

use crate::fusion::FusionParams;
use crate::matcher::MatchFloors;
use ordreg_common::db::settings::get_setting;
use ordreg_common::Result;
use sqlx::SqlitePool;

/// Pipeline parameters as resolved for one processing run
#[derive(Debug, Clone, Copy)]
pub struct PipelineParams {
    pub floors: MatchFloors,
    pub fusion: FusionParams,
}

impl Default for PipelineParams {
    fn default() -> Self {
        Self {
            floors: MatchFloors::default(),
            fusion: FusionParams::default(),
        }
    }
}

impl PipelineParams {
    /// Load parameters, falling back to defaults for unset keys
    pub async fn load(db: &SqlitePool) -> Result<Self> {
        let defaults = Self::default();

        let synonym_floor = get_setting(db, "match_synonym_floor")
            .await?
            .unwrap_or(defaults.floors.synonym_floor);
        let fuzzy_floor = get_setting(db, "match_fuzzy_floor")
            .await?
            .unwrap_or(defaults.floors.fuzzy_floor);
        let warn_penalty = get_setting(db, "fusion_warn_penalty")
            .await?
            .unwrap_or(defaults.fusion.warn_penalty);
        let review_threshold = get_setting(db, "fusion_review_threshold")
            .await?
            .unwrap_or(defaults.fusion.review_threshold);

        Ok(Self {
            floors: MatchFloors {
                synonym_floor,
                fuzzy_floor,
            },
            fusion: FusionParams {
                warn_penalty,
                review_threshold,
            },
        })
    }
}
