use serde::Serialize;

use super::repo::Assignment;

/// The fixed daily slots a meal can be assigned to, in display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MealSlot {
    EarlyMorning,
    After30Minutes,
    Breakfast,
    MidMeal,
    Lunch,
    EveningSnacks,
    LateEvening,
    Dinner,
    BedTime,
}

impl MealSlot {
    pub const ALL: [MealSlot; 9] = [
        MealSlot::EarlyMorning,
        MealSlot::After30Minutes,
        MealSlot::Breakfast,
        MealSlot::MidMeal,
        MealSlot::Lunch,
        MealSlot::EveningSnacks,
        MealSlot::LateEvening,
        MealSlot::Dinner,
        MealSlot::BedTime,
    ];

    pub fn key(self) -> &'static str {
        match self {
            MealSlot::EarlyMorning => "EARLY_MORNING",
            MealSlot::After30Minutes => "AFTER_30_MINUTES",
            MealSlot::Breakfast => "BREAKFAST",
            MealSlot::MidMeal => "MID_MEAL",
            MealSlot::Lunch => "LUNCH",
            MealSlot::EveningSnacks => "EVENING_SNACKS",
            MealSlot::LateEvening => "LATE_EVENING",
            MealSlot::Dinner => "DINNER",
            MealSlot::BedTime => "BED_TIME",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            MealSlot::EarlyMorning => "Early Morning",
            MealSlot::After30Minutes => "After 30 Minutes",
            MealSlot::Breakfast => "Breakfast",
            MealSlot::MidMeal => "Mid Meal",
            MealSlot::Lunch => "Lunch",
            MealSlot::EveningSnacks => "Evening Snacks",
            MealSlot::LateEvening => "Late Evening",
            MealSlot::Dinner => "Dinner",
            MealSlot::BedTime => "Bed Time",
        }
    }

    /// Accepts either the key or the display label in any casing/spacing.
    pub fn parse(label: &str) -> Option<MealSlot> {
        let key = normalize_label(label);
        Self::ALL.into_iter().find(|s| s.key() == key)
    }
}

/// `" late   evening "` -> `"LATE_EVENING"`.
pub fn normalize_label(label: &str) -> String {
    label
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
        .to_uppercase()
}

#[derive(Debug, Clone, Serialize)]
pub struct SlotGroup {
    pub key: &'static str,
    pub label: &'static str,
    pub meals: Vec<Assignment>,
}

/// A user's assignments bucketed per slot. Every slot is always present;
/// records with an unrecognised time label land in `other`.
#[derive(Debug, Clone, Serialize)]
pub struct MealBoard {
    pub slots: Vec<SlotGroup>,
    pub other: Vec<Assignment>,
}

pub fn group_by_slot(records: &[Assignment]) -> MealBoard {
    let mut slots: Vec<SlotGroup> = MealSlot::ALL
        .iter()
        .map(|s| SlotGroup {
            key: s.key(),
            label: s.label(),
            meals: Vec::new(),
        })
        .collect();
    let mut other = Vec::new();

    for rec in records {
        match MealSlot::parse(&rec.meal_time) {
            Some(slot) => {
                // ALL and `slots` share the same order
                let idx = MealSlot::ALL.iter().position(|s| *s == slot).unwrap_or(0);
                slots[idx].meals.push(rec.clone());
            }
            None => other.push(rec.clone()),
        }
    }

    MealBoard { slots, other }
}
