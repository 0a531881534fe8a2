//! # GM / Convention / Adventure Associations
//!
//! The three-way assignment model that narrows survey dropdowns:
//!
//! ```text
//! gm_conventions (gm, convention)
//!        ▲
//!        │ composite key
//! gm_adventures  (gm, convention, adventure)
//! ```
//!
//! Picking a convention narrows the GM dropdown to the GMs assigned to it;
//! picking a GM narrows the adventure dropdown to what that GM runs at that
//! convention. An empty narrowing result is reported as
//! [`OptionAvailability::Unassigned`] with no options. It never widens
//! back to the full list.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AssociationError;
use crate::identity::{AssignmentId, OptionId};
use crate::question::{OptionAvailability, QuestionOption, QuestionRole};
use crate::survey::SurveyDefinition;

/// A GM assigned to run games at a convention.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct GmConvention {
    pub id: AssignmentId,
    pub gm_option_id: OptionId,
    pub convention_option_id: OptionId,
    pub created_at: DateTime<Utc>,
}

/// An adventure a GM runs at a specific convention.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct GmAdventure {
    pub id: AssignmentId,
    pub gm_option_id: OptionId,
    pub convention_option_id: OptionId,
    pub adventure_option_id: OptionId,
    pub created_at: DateTime<Utc>,
}

/// Upstream dropdown selections that drive narrowing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    pub convention: Option<OptionId>,
    pub gm: Option<OptionId>,
}

/// Options kept for one narrowed dropdown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct NarrowedOptions {
    pub options: Vec<QuestionOption>,
    pub availability: OptionAvailability,
}

/// Lookup structure over all assignment rows.
#[derive(Debug, Clone, Default)]
pub struct AssociationIndex {
    gms_by_convention: BTreeMap<OptionId, BTreeSet<OptionId>>,
    conventions_by_gm: BTreeMap<OptionId, BTreeSet<OptionId>>,
    adventures: BTreeMap<(OptionId, OptionId), BTreeSet<OptionId>>,
}

impl AssociationIndex {
    /// Index the given rows.
    ///
    /// Adventure rows without a matching convention row are ignored, the
    /// same way the composite foreign key would have refused them.
    pub fn new(conventions: &[GmConvention], adventures: &[GmAdventure]) -> Self {
        let mut index = Self::default();
        for row in conventions {
            index
                .gms_by_convention
                .entry(row.convention_option_id)
                .or_default()
                .insert(row.gm_option_id);
            index
                .conventions_by_gm
                .entry(row.gm_option_id)
                .or_default()
                .insert(row.convention_option_id);
        }
        for row in adventures {
            if index.is_assigned(row.gm_option_id, row.convention_option_id) {
                index
                    .adventures
                    .entry((row.gm_option_id, row.convention_option_id))
                    .or_default()
                    .insert(row.adventure_option_id);
            }
        }
        index
    }

    /// Whether `gm` is assigned to `convention`.
    pub fn is_assigned(&self, gm: OptionId, convention: OptionId) -> bool {
        self.gms_by_convention
            .get(&convention)
            .is_some_and(|gms| gms.contains(&gm))
    }

    /// Reject an adventure assignment whose (gm, convention) pair is not assigned.
    pub fn check_adventure(
        &self,
        gm: OptionId,
        convention: OptionId,
    ) -> Result<(), AssociationError> {
        if self.is_assigned(gm, convention) {
            Ok(())
        } else {
            Err(AssociationError::MissingConventionAssignment { gm, convention })
        }
    }

    /// GMs assigned to `convention`.
    pub fn gms_for(&self, convention: OptionId) -> BTreeSet<OptionId> {
        self.gms_by_convention
            .get(&convention)
            .cloned()
            .unwrap_or_default()
    }

    /// Adventures `gm` runs at `convention`, or at any of the GM's
    /// conventions when none is given.
    pub fn adventures_for(&self, gm: OptionId, convention: Option<OptionId>) -> BTreeSet<OptionId> {
        match convention {
            Some(convention) => self
                .adventures
                .get(&(gm, convention))
                .cloned()
                .unwrap_or_default(),
            None => self
                .conventions_by_gm
                .get(&gm)
                .into_iter()
                .flatten()
                .filter_map(|c| self.adventures.get(&(gm, *c)))
                .flatten()
                .copied()
                .collect(),
        }
    }
}

/// Narrow the GM options of `definition` for a selected convention.
pub fn narrow_gms(
    definition: &SurveyDefinition,
    index: &AssociationIndex,
    convention: Option<OptionId>,
) -> NarrowedOptions {
    let options = role_options(definition, QuestionRole::GameMaster);
    match convention {
        None => NarrowedOptions {
            options,
            availability: OptionAvailability::Unfiltered,
        },
        Some(convention) => keep(options, &index.gms_for(convention)),
    }
}

/// Narrow the adventure options of `definition` for a selected GM.
pub fn narrow_adventures(
    definition: &SurveyDefinition,
    index: &AssociationIndex,
    gm: Option<OptionId>,
    convention: Option<OptionId>,
) -> NarrowedOptions {
    let options = role_options(definition, QuestionRole::Adventure);
    match gm {
        None => NarrowedOptions {
            options,
            availability: OptionAvailability::Unfiltered,
        },
        Some(gm) => keep(options, &index.adventures_for(gm, convention)),
    }
}

/// Apply a selection to every role dropdown of `definition`.
pub fn narrow(
    mut definition: SurveyDefinition,
    index: &AssociationIndex,
    selection: Selection,
) -> SurveyDefinition {
    let gms = narrow_gms(&definition, index, selection.convention);
    let adventures = narrow_adventures(&definition, index, selection.gm, selection.convention);
    for (role, narrowed) in [
        (QuestionRole::GameMaster, gms),
        (QuestionRole::Adventure, adventures),
    ] {
        if let Some(q) = definition.question_by_role_mut(role) {
            q.options = narrowed.options;
            q.availability = narrowed.availability;
        }
    }
    definition
}

fn role_options(definition: &SurveyDefinition, role: QuestionRole) -> Vec<QuestionOption> {
    definition
        .question_by_role(role)
        .map(|q| q.options.clone())
        .unwrap_or_default()
}

fn keep(options: Vec<QuestionOption>, allowed: &BTreeSet<OptionId>) -> NarrowedOptions {
    let options: Vec<QuestionOption> = options
        .into_iter()
        .filter(|o| allowed.contains(&o.id))
        .collect();
    let availability = if options.is_empty() {
        OptionAvailability::Unassigned
    } else {
        OptionAvailability::Filtered
    };
    NarrowedOptions {
        options,
        availability,
    }
}
