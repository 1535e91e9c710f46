//! Recipe selection: resolve a platform, channel and goal to a weighting
//! recipe, or refuse combinations with no built-in definition.

pub mod defs;
pub mod mapping;

use thiserror::Error;

use crate::model::recipe::{Channel, Goal, MetricSpec, Platform, ScoringRecipe};

use defs::{RecipeDef, builtin_recipes};

#[derive(Debug, Error)]
pub enum RecipeError {
    #[error(
        "no scoring recipe for platform {} channel {} goal {}",
        .platform.label(),
        .channel.label(),
        .goal.label()
    )]
    UnsupportedCombination {
        platform: Platform,
        channel: Channel,
        goal: Goal,
    },
}

fn find_def(
    platform: Platform,
    channel: Channel,
    goal: Goal,
    ctr_sensitive: bool,
) -> Option<&'static RecipeDef> {
    builtin_recipes().iter().find(|def| {
        def.platform == platform
            && def.channel == channel
            && def.goal.is_none_or(|g| g == goal)
            && def.ctr_sensitive == ctr_sensitive
    })
}

/// Looks up the built-in recipe for the combination. The CTR-sensitive flag
/// selects the dedicated variant where one exists and is ignored elsewhere.
pub fn get_recipe(
    platform: Platform,
    goal: Goal,
    channel: Channel,
    ctr_sensitivity: bool,
) -> Result<ScoringRecipe, RecipeError> {
    let def = find_def(platform, channel, goal, ctr_sensitivity)
        .or_else(|| {
            if ctr_sensitivity {
                find_def(platform, channel, goal, false)
            } else {
                None
            }
        })
        .ok_or(RecipeError::UnsupportedCombination {
            platform,
            channel,
            goal,
        })?;

    Ok(ScoringRecipe {
        platform: def.platform,
        goal,
        channel: def.channel,
        ctr_sensitivity: def.ctr_sensitive,
        analysis_level: def.analysis_level,
        metrics: def
            .metrics
            .iter()
            .map(|m| MetricSpec {
                name: m.name.to_string(),
                weight: m.weight,
                higher_is_better: m.higher_is_better,
                required: m.required,
            })
            .collect(),
        required_raw_fields: def
            .required_raw_fields
            .iter()
            .map(|f| f.to_string())
            .collect(),
    })
}
