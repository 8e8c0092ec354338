//! services/booth/src/presets.rs
//!
//! The catalogue of ready-made dreams a child can pick instead of typing one.
//! Each preset renders to a complete prompt and is offered as a built-in template.

/// Shared prompt body; `{profession}` and `{description}` are filled per preset.
const BASE_PROMPT: &str = "Transform this child photo into a cute young {profession}.
The child should be wearing professional {description}.
IMPORTANT: Keep the child's face exactly the same, maintain facial features and expression.
Style: Bright, colorful, child-friendly cartoon/Disney Pixar style.
Background: Appropriate professional environment.
Mood: Happy, confident, inspiring.
The result should look like a professional portrait that celebrates children's dreams.";

/// Template ids of presets are the preset id behind this prefix.
pub const PRESET_TEMPLATE_PREFIX: &str = "preset-";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DreamPreset {
    pub id: &'static str,
    pub name: &'static str,
    /// What the child becomes, as it reads inside the prompt.
    pub profession: &'static str,
    /// Outfit and scene.
    pub description: &'static str,
}

impl DreamPreset {
    pub fn prompt(&self) -> String {
        BASE_PROMPT
            .replace("{profession}", self.profession)
            .replace("{description}", self.description)
    }

    pub fn template_id(&self) -> String {
        format!("{}{}", PRESET_TEMPLATE_PREFIX, self.id)
    }
}

const fn preset(
    id: &'static str,
    name: &'static str,
    profession: &'static str,
    description: &'static str,
) -> DreamPreset {
    DreamPreset {
        id,
        name,
        profession,
        description,
    }
}

static PRESETS: [DreamPreset; 16] = [
    preset("astronaut", "Astronaut", "astronaut",
        "a white space suit with helmet, standing in front of a space shuttle or on the moon with Earth in the background"),
    preset("doctor", "Doctor", "doctor",
        "a white lab coat with stethoscope around neck, in a bright and friendly hospital or clinic setting"),
    preset("firefighter", "Firefighter", "firefighter",
        "a firefighter uniform with helmet, standing proudly in front of a fire truck"),
    preset("scientist", "Scientist", "scientist",
        "a lab coat with safety goggles, in a colorful laboratory with beakers and scientific equipment"),
    preset("teacher", "Teacher", "teacher",
        "professional teaching attire, standing in front of a colorful classroom blackboard with books"),
    preset("pilot", "Pilot", "pilot",
        "a pilot uniform with captain hat, in an airplane cockpit or in front of a plane"),
    preset("chef", "Chef", "chef",
        "a white chef coat and tall chef hat, in a professional kitchen with cooking utensils"),
    preset("artist", "Artist", "artist",
        "artistic clothing with paint splashes, holding a palette and brush in a colorful art studio"),
    preset("athlete", "Athlete", "Olympic athlete",
        "a sports uniform, standing on a winner podium with a gold medal, in a stadium"),
    preset("musician", "Musician", "musician",
        "elegant performance attire, holding a musical instrument on a concert stage with lights"),
    preset("police", "Police Officer", "police officer",
        "a police uniform with badge, standing protectively in a friendly neighborhood"),
    preset("engineer", "Engineer", "engineer",
        "work clothes with safety helmet, at a construction site or with robots/machines"),
    preset("veterinarian", "Veterinarian", "veterinarian",
        "a veterinary coat with stethoscope, in a pet clinic surrounded by cute animals"),
    preset("superhero", "Superhero", "superhero",
        "a colorful superhero costume with cape, flying pose with city skyline in background"),
    preset("princess", "Princess/Prince", "royal princess or prince",
        "a beautiful royal gown or prince outfit with crown, in a magical fairy tale castle"),
    preset("explorer", "Explorer", "explorer",
        "adventure gear with hat and backpack, in a jungle or ancient ruins discovering treasures"),
];

pub fn dream_presets() -> &'static [DreamPreset] {
    &PRESETS
}

/// Looks a preset up by its bare id (`"astronaut"`) or its template id (`"preset-astronaut"`).
pub fn preset_by_id(id: &str) -> Option<&'static DreamPreset> {
    let id = id.strip_prefix(PRESET_TEMPLATE_PREFIX).unwrap_or(id);
    PRESETS.iter().find(|p| p.id == id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn catalogue_has_sixteen_unique_presets() {
        let ids: HashSet<&str> = dream_presets().iter().map(|p| p.id).collect();
        assert_eq!(dream_presets().len(), 16);
        assert_eq!(ids.len(), 16);
    }

    #[test]
    fn prompt_fills_profession_and_outfit() {
        let athlete = preset_by_id("athlete").unwrap();
        let prompt = athlete.prompt();
        assert!(prompt.starts_with("Transform this child photo into a cute young Olympic athlete."));
        assert!(prompt.contains("wearing professional a sports uniform, standing on a winner podium"));
        assert!(!prompt.contains('{'));
    }

    #[test]
    fn lookup_accepts_both_id_forms() {
        assert_eq!(preset_by_id("preset-chef").map(|p| p.name), Some("Chef"));
        assert_eq!(preset_by_id("chef").map(|p| p.template_id()), Some("preset-chef".to_string()));
        assert!(preset_by_id("astronaut-2").is_none());
    }
}
