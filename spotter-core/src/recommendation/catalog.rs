//! Built-in exercise table.

#[derive(Debug, Clone, Copy)]
pub struct CatalogEntry {
    pub id: &'static str,
    pub name: &'static str,
    pub muscle_group: &'static str,
    pub description: &'static str,
    /// Bodyweight or light-load movement suitable for high-rep conditioning.
    pub conditioning: bool,
}

pub const ENTRIES: &[CatalogEntry] = &[
    CatalogEntry {
        id: "goblet-squat",
        name: "Goblet Squat",
        muscle_group: "legs",
        description: "Hold a weight at your chest, sit back and down, drive up through the heels.",
        conditioning: false,
    },
    CatalogEntry {
        id: "push-up",
        name: "Push-Up",
        muscle_group: "chest",
        description: "Hands under shoulders, body in a straight line, lower chest to the floor.",
        conditioning: true,
    },
    CatalogEntry {
        id: "dumbbell-row",
        name: "Dumbbell Row",
        muscle_group: "back",
        description: "Brace on a bench, pull the dumbbell to your hip, squeeze the shoulder blade.",
        conditioning: false,
    },
    CatalogEntry {
        id: "romanian-deadlift",
        name: "Romanian Deadlift",
        muscle_group: "hamstrings",
        description: "Soft knees, hinge at the hips, keep the weight close to the legs.",
        conditioning: false,
    },
    CatalogEntry {
        id: "overhead-press",
        name: "Overhead Press",
        muscle_group: "shoulders",
        description: "Press the weight overhead from the shoulders without arching the lower back.",
        conditioning: false,
    },
    CatalogEntry {
        id: "reverse-lunge",
        name: "Reverse Lunge",
        muscle_group: "legs",
        description: "Step back, lower the rear knee toward the floor, push through the front heel.",
        conditioning: true,
    },
    CatalogEntry {
        id: "plank",
        name: "Plank",
        muscle_group: "core",
        description: "Forearms down, hips level, hold a rigid line from head to heels.",
        conditioning: true,
    },
    CatalogEntry {
        id: "burpee",
        name: "Burpee",
        muscle_group: "full body",
        description: "Squat, kick back to a plank, return and jump with hands overhead.",
        conditioning: true,
    },
    CatalogEntry {
        id: "mountain-climber",
        name: "Mountain Climber",
        muscle_group: "core",
        description: "From a high plank, drive the knees toward the chest one at a time.",
        conditioning: true,
    },
];

pub fn find(id: &str) -> Option<&'static CatalogEntry> {
    ENTRIES.iter().find(|e| e.id == id)
}
