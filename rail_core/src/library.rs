//! Content library: the built-in default library, snapshot loading,
//! validation, and the per-request lookup index.

use crate::types::*;
use crate::{Error, Result};
use once_cell::sync::Lazy;
use std::collections::{HashMap, HashSet};
use std::path::Path;

pub const DEFAULT_LIBRARY_VERSION: &str = "2024.1";

const KNOWN_CONTRA_TAGS: [&str; 7] = [
    "injury:knee",
    "injury:shoulder",
    "injury:back",
    "injury:neck",
    "eq:dumbbells",
    "eq:bands",
    "eq:gym",
];

/// Built-in library, constructed once. Immutable.
static DEFAULT_LIBRARY: Lazy<Library> = Lazy::new(build_default_library);

/// Get a reference to the built-in library
pub fn default_library() -> &'static Library {
    &DEFAULT_LIBRARY
}

fn tags(list: &[&str]) -> Vec<String> {
    list.iter().map(|t| (*t).to_string()).collect()
}

fn reset_item(id: &str, title: &str, duration_sec: u32, t: &[&str], contra: &[&str], group: &str) -> ResetItem {
    ResetItem {
        id: id.into(),
        title: title.into(),
        tags: tags(t),
        contra_tags: tags(contra),
        novelty_group: Some(group.into()),
        duration_sec,
    }
}

fn movement_item(
    id: &str,
    title: &str,
    duration_min: u32,
    intensity: u8,
    t: &[&str],
    contra: &[&str],
    group: &str,
) -> MovementItem {
    MovementItem {
        id: id.into(),
        title: title.into(),
        tags: tags(t),
        contra_tags: tags(contra),
        novelty_group: Some(group.into()),
        duration_min,
        intensity,
    }
}

fn nutrition_item(id: &str, title: &str, t: &[&str], group: &str) -> NutritionItem {
    NutritionItem {
        id: id.into(),
        title: title.into(),
        tags: tags(t),
        contra_tags: vec![],
        novelty_group: Some(group.into()),
    }
}

/// Builds the default content library
pub fn build_default_library() -> Library {
    // ========================================================================
    // Resets
    // ========================================================================
    let resets = vec![
        reset_item("reset_478_breath", "4-7-8 breathing", 90, &["breath", "downshift", "evening"], &[], "breath_478"),
        reset_item("reset_body_scan", "Short body scan", 300, &["downshift", "evening"], &[], "body_scan"),
        reset_item("reset_box_breath", "Box breathing", 120, &["breath", "downshift"], &[], "breath_box"),
        reset_item("reset_coherent_breath", "Coherent breathing", 240, &["breath"], &[], "breath_coherent"),
        reset_item("reset_daylight", "Two minutes of daylight", 120, &["morning", "energize"], &[], "daylight"),
        reset_item("reset_desk_stretch", "Desk stretch", 150, &["midday", "mobility"], &["injury:back"], "release"),
        reset_item("reset_neck_release", "Neck and jaw release", 180, &["downshift", "mobility"], &["injury:neck"], "release"),
        reset_item("reset_physiological_sigh", "Physiological sighs", 60, &["breath", "downshift"], &[], "breath_sigh"),
    ];

    // ========================================================================
    // Movement
    // ========================================================================
    let movement = vec![
        movement_item("move_band_rows", "Band rows", 8, 2, &["upper", "pull"], &["eq:bands", "injury:shoulder"], "pull"),
        movement_item("move_bodyweight_intervals", "Bodyweight intervals", 12, 5, &["cardio", "vigorous"], &["injury:knee"], "intervals"),
        movement_item("move_brisk_walk", "Brisk walk", 20, 3, &["cardio", "outdoor"], &[], "walk"),
        movement_item("move_chair_squats", "Chair squats", 5, 2, &["light", "lower"], &["injury:knee"], "squat"),
        movement_item("move_dumbbell_circuit", "Dumbbell circuit", 15, 4, &["strength"], &["eq:dumbbells", "injury:back"], "circuit"),
        movement_item("move_easy_walk", "Easy walk", 10, 1, &["light", "downshift", "outdoor"], &[], "walk"),
        movement_item("move_gentle_yoga", "Gentle yoga stretch", 15, 1, &["light", "downshift", "mobility"], &["injury:neck"], "yoga"),
        movement_item("move_mobility_flow", "Mobility flow", 6, 1, &["light", "mobility", "downshift"], &[], "mobility"),
        movement_item("move_rower_intervals", "Rowing machine intervals", 20, 4, &["cardio"], &["eq:gym", "injury:back"], "intervals"),
    ];

    // ========================================================================
    // Nutrition
    // ========================================================================
    let nutrition = vec![
        nutrition_item("nut_banana_nut_butter", "Banana with nut butter", &["simple", "recovery", "nuts"], "snack"),
        nutrition_item("nut_caffeine_cutoff", "Caffeine cutoff by 2pm", &["simple", "sleep"], "caffeine"),
        nutrition_item("nut_greek_yogurt", "Greek yogurt snack", &["protein", "dairy", "recovery"], "protein"),
        nutrition_item("nut_magnesium_dinner", "Magnesium-rich dinner", &["recovery", "nuts", "evening"], "minerals"),
        nutrition_item("nut_protein_breakfast", "Protein at breakfast", &["protein", "eggs", "morning"], "protein"),
        nutrition_item("nut_warm_oats", "Warm oats", &["simple", "gluten", "recovery"], "grains"),
        nutrition_item("nut_water_first", "Glass of water first", &["simple", "hydration"], "hydration"),
    ];

    Library {
        version: DEFAULT_LIBRARY_VERSION.into(),
        resets,
        movement,
        nutrition,
    }
}

impl Library {
    /// Load a library snapshot from a JSON file
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let library: Library = serde_json::from_str(&contents)?;
        tracing::info!(
            "Loaded library {} from {:?} ({} resets, {} movement, {} nutrition)",
            library.version,
            path,
            library.resets.len(),
            library.movement.len(),
            library.nutrition.len()
        );
        Ok(library)
    }

    /// Load a snapshot and reject it if validation fails
    pub fn load_validated(path: &Path) -> Result<Self> {
        let library = Self::load_from(path)?;
        let errors = library.validate();
        if !errors.is_empty() {
            return Err(Error::LibraryValidation(errors.join("; ")));
        }
        Ok(library)
    }

    /// Validate the library for consistency and completeness
    ///
    /// Returns a list of validation errors, or empty Vec if valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.version.trim().is_empty() {
            errors.push("Library has empty version".to_string());
        }

        check_items(&self.resets, "Reset", &mut errors);
        check_items(&self.movement, "Movement", &mut errors);
        check_items(&self.nutrition, "Nutrition", &mut errors);

        for r in &self.resets {
            if r.duration_sec == 0 {
                errors.push(format!("Reset '{}' has zero duration", r.id));
            }
        }

        for m in &self.movement {
            if m.duration_min == 0 {
                errors.push(format!("Movement '{}' has zero duration", m.id));
            }
            if !(1..=5).contains(&m.intensity) {
                errors.push(format!(
                    "Movement '{}': intensity {} outside 1..=5",
                    m.id, m.intensity
                ));
            }
        }

        if self.resets.is_empty() {
            errors.push("Library has no resets".to_string());
        }
        if self.movement.is_empty() {
            errors.push("Library has no movement items".to_string());
        }
        if self.nutrition.is_empty() {
            errors.push("Library has no nutrition items".to_string());
        }

        errors
    }
}

fn check_items<T: ContentItem + HasTitle>(items: &[T], label: &str, errors: &mut Vec<String>) {
    let mut seen = HashSet::new();
    for item in items {
        if item.id().is_empty() {
            errors.push(format!("{} has empty ID", label));
        } else if !seen.insert(item.id()) {
            errors.push(format!("{} ID '{}' is duplicated", label, item.id()));
        }
        if item.title().is_empty() {
            errors.push(format!("{} '{}' has empty title", label, item.id()));
        }
        for tag in item.contra_tags() {
            if !KNOWN_CONTRA_TAGS.contains(&tag.as_str()) {
                errors.push(format!(
                    "{} '{}' has unknown contraindication tag '{}'",
                    label,
                    item.id(),
                    tag
                ));
            }
        }
    }
}

trait HasTitle {
    fn title(&self) -> &str;
}

impl HasTitle for ResetItem {
    fn title(&self) -> &str {
        &self.title
    }
}

impl HasTitle for MovementItem {
    fn title(&self) -> &str {
        &self.title
    }
}

impl HasTitle for NutritionItem {
    fn title(&self) -> &str {
        &self.title
    }
}

// ============================================================================
// Lookup index
// ============================================================================

/// Id-sorted pools and id lookups for one library version.
///
/// Built once per request (or per library version) and passed by reference;
/// there is no process-wide cache.
#[derive(Clone, Debug)]
pub struct LibraryIndex {
    version: String,
    resets: Vec<ResetItem>,
    movement: Vec<MovementItem>,
    nutrition: Vec<NutritionItem>,
    reset_pos: HashMap<String, usize>,
    movement_pos: HashMap<String, usize>,
    nutrition_pos: HashMap<String, usize>,
}

fn sorted_unique<T: ContentItem + Clone>(items: &[T]) -> Vec<T> {
    let mut sorted = items.to_vec();
    sorted.sort_by(|a, b| a.id().cmp(b.id()));
    let before = sorted.len();
    sorted.dedup_by(|a, b| a.id() == b.id());
    if sorted.len() != before {
        tracing::warn!(
            "Dropped {} duplicate {:?} ids while indexing library",
            before - sorted.len(),
            T::KIND
        );
    }
    sorted
}

fn positions<T: ContentItem>(items: &[T]) -> HashMap<String, usize> {
    items
        .iter()
        .enumerate()
        .map(|(i, item)| (item.id().to_string(), i))
        .collect()
}

impl LibraryIndex {
    pub fn new(library: &Library) -> Self {
        let resets = sorted_unique(&library.resets);
        let movement = sorted_unique(&library.movement);
        let nutrition = sorted_unique(&library.nutrition);

        Self {
            version: library.version.clone(),
            reset_pos: positions(&resets),
            movement_pos: positions(&movement),
            nutrition_pos: positions(&nutrition),
            resets,
            movement,
            nutrition,
        }
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn resets(&self) -> &[ResetItem] {
        &self.resets
    }

    pub fn movement(&self) -> &[MovementItem] {
        &self.movement
    }

    pub fn nutrition(&self) -> &[NutritionItem] {
        &self.nutrition
    }

    pub fn reset(&self, id: &str) -> Option<&ResetItem> {
        self.reset_pos.get(id).map(|&i| &self.resets[i])
    }

    pub fn movement_item(&self, id: &str) -> Option<&MovementItem> {
        self.movement_pos.get(id).map(|&i| &self.movement[i])
    }

    pub fn nutrition_item(&self, id: &str) -> Option<&NutritionItem> {
        self.nutrition_pos.get(id).map(|&i| &self.nutrition[i])
    }

    /// Resolve a stored day state back into library items.
    /// Ids missing from this library version resolve to `None`.
    pub fn resolve(&self, state: &DayState) -> Selection {
        Selection {
            reset: state.reset_id.as_deref().and_then(|id| self.reset(id)).cloned(),
            movement: state
                .movement_id
                .as_deref()
                .and_then(|id| self.movement_item(id))
                .cloned(),
            nutrition: state
                .nutrition_id
                .as_deref()
                .and_then(|id| self.nutrition_item(id))
                .cloned(),
        }
    }
}
