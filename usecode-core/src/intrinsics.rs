//! Intrinsic table
//!
//! Maps 16-bit intrinsic ids to `{name, parameter count, description}`. The
//! built-in dataset is loaded once per process; extra datasets can be read
//! from TOML and merged over it.
//!
//! ```toml
//! [[intrinsic]]
//! id = 0x0088
//! name = "check_object_flag"
//! params = 2
//! description = "Check object flag state"
//! ```

use std::collections::HashMap;
use std::path::Path;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// One intrinsic table entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntrinsicEntry {
    pub id: u16,
    pub name: String,
    /// Expected parameter count
    pub params: u8,
    pub description: String,
}

impl IntrinsicEntry {
    pub fn new(id: u16, name: &str, params: u8, description: &str) -> Self {
        Self {
            id,
            name: name.to_string(),
            params,
            description: description.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct IntrinsicFile {
    #[serde(default)]
    intrinsic: Vec<IntrinsicEntry>,
}

/// Read-only intrinsic lookup table
#[derive(Debug, Clone, Default)]
pub struct IntrinsicTable {
    entries: HashMap<u16, IntrinsicEntry>,
}

impl IntrinsicTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in dataset, built once per process
    pub fn builtin() -> &'static IntrinsicTable {
        &BUILTIN
    }

    pub fn from_entries(entries: impl IntoIterator<Item = IntrinsicEntry>) -> Self {
        Self {
            entries: entries.into_iter().map(|e| (e.id, e)).collect(),
        }
    }

    /// Parse a TOML dataset of `[[intrinsic]]` tables
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let file: IntrinsicFile = toml::from_str(content)?;
        Ok(Self::from_entries(file.intrinsic))
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Entries of `other` replace entries with the same id
    pub fn merge(&mut self, other: IntrinsicTable) {
        self.entries.extend(other.entries);
    }

    pub fn get(&self, id: u16) -> Option<&IntrinsicEntry> {
        self.entries.get(&id)
    }

    pub fn contains(&self, id: u16) -> bool {
        self.entries.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries sorted by id
    pub fn sorted(&self) -> Vec<&IntrinsicEntry> {
        let mut entries: Vec<_> = self.entries.values().collect();
        entries.sort_by_key(|e| e.id);
        entries
    }
}

/// Event type constants passed in `eventid`
pub const EVENT_TYPES: &[(u16, &str)] = &[
    (0, "bark"),
    (1, "doubleclick"),
    (2, "use"),
    (3, "egg"),
    (4, "spell"),
    (7, "special"),
];

/// Descriptive hints for well-known usecode function numbers
pub const KNOWN_FUNCTIONS: &[(u16, &str)] = &[
    (0x0829, "check_gangplank_position"),
    (0x08FF, "show_message"),
    (0x0900, "unknown_getter"),
    (0x0903, "unknown_setter"),
    (0x090C, "display_options_wrapper"),
    (0x0910, "get_npc_property_alt"),
    (0x0912, "set_npc_property_alt"),
    (0x091B, "format_price_string"),
];

pub fn known_function(func_number: u16) -> Option<&'static str> {
    KNOWN_FUNCTIONS
        .iter()
        .find(|(id, _)| *id == func_number)
        .map(|(_, name)| *name)
}

static BUILTIN: Lazy<IntrinsicTable> = Lazy::new(|| {
    IntrinsicTable::from_entries(
        BUILTIN_ENTRIES
            .iter()
            .map(|&(id, name, params, description)| IntrinsicEntry::new(id, name, params, description)),
    )
});

const BUILTIN_ENTRIES: &[(u16, &str, u8, &str)] = &[
    // Conversation
    (0x0003, "second_speaker", 3, "Set secondary speaker in conversation"),
    (0x0004, "hide_npc", 1, "Hide NPC portrait in conversation"),
    (0x0005, "add_answer", 1, "Add dialogue answer options"),
    (0x0006, "remove_answer", 1, "Remove dialogue answer options"),
    (0x0007, "save_answers", 0, "Save current answer state"),
    (0x0008, "restore_answers", 0, "Restore saved answer state"),
    (0x000A, "get_answer", 0, "Get player's dialogue choice"),
    (0x000B, "ask_yes_no", 0, "Present Yes/No choice"),
    (0x000C, "ask_number", 4, "Ask player for numeric input"),
    (0x0033, "object_select_modal", 0, "Show object selection dialog"),
    // Objects
    (0x000D, "set_object_shape", 2, "Set object shape ID"),
    (0x0011, "get_object_shape", 1, "Get object shape ID"),
    (0x0012, "get_object_frame", 1, "Get object frame number"),
    (0x0013, "set_object_frame", 2, "Set object frame number"),
    (0x0014, "get_object_quality", 1, "Get object quality value"),
    (0x0015, "set_object_quality", 2, "Set object quality value"),
    (0x0024, "spawn_object", 1, "Create new object"),
    (0x0025, "set_last_created", 1, "Mark object as last_created"),
    (0x0026, "set_object_position", 1, "Set object position"),
    // NPCs
    (0x001B, "get_npc_object", 1, "Get NPC object reference"),
    (0x001C, "get_schedule", 1, "Get NPC schedule type"),
    (0x0020, "get_npc_property", 2, "Get NPC property value"),
    (0x0021, "set_npc_property", 3, "Set NPC property value"),
    (0x0022, "get_active_player", 0, "Get avatar/player reference"),
    (0x0027, "get_player_name", 1, "Get player/NPC name"),
    (0x0031, "is_npc", 1, "Check if object is an NPC"),
    // Party
    (0x0023, "get_party_members", 0, "Get list of party member names"),
    (0x002F, "npc_id_in_party", 1, "Check if NPC ID is in party"),
    (0x0030, "add_to_party", 1, "Add NPC to party"),
    // Containers
    (0x0001, "add_to_container", 2, "Add item to container"),
    (0x0002, "remove_from_container", 3, "Remove item from container"),
    (0x002A, "get_container_objects", 4, "Get objects in container"),
    (0x006E, "get_container", 1, "Get container holding object"),
    // Position and movement
    (0x0018, "get_object_position", 1, "Get object position"),
    (0x0019, "get_distance", 2, "Get distance between objects"),
    (0x001A, "get_direction", 2, "Get direction from object to target"),
    (0x0035, "check_in_range", 4, "Check if object in range"),
    (0x0085, "is_not_blocked", 3, "Check if position not blocked"),
    // World time
    (0x0038, "get_time_hour", 0, "Get current game hour"),
    (0x0039, "get_time_minute", 0, "Get current game minute"),
    // Audio and visuals
    (0x002E, "play_music", 2, "Play music track"),
    (0x0040, "bark", 2, "Display text near object"),
    (0x0051, "play_sound_effect", 1, "Play sound effect"),
    (0x0054, "sprite_effect", 3, "Play visual effect"),
    // Game state
    (0x0048, "close_gumps", 0, "Close all GUI windows"),
    (0x0058, "is_in_usecode", 1, "Check if in usecode execution"),
    (0x0062, "get_avatar_ref", 0, "Get avatar object reference"),
    (0x0068, "detect_mouse", 0, "Check if mouse exists"),
    (0x0079, "in_usecode", 1, "Mark object as in usecode"),
    (0x0081, "is_in_gump_mode", 0, "Check if GUI is open"),
    (0x0088, "check_object_flag", 2, "Check object flag state"),
    // Utility
    (0x0000, "random", 1, "Get random number"),
    (0x0010, "random2", 2, "Get random number in range"),
    (0x005E, "array_size", 1, "Get array size"),
    (0x0072, "execute_usecode_array", 4, "Execute embedded usecode"),
    (0x007D, "add_containerobject_s", 2, "Add multiple items to container"),
    (0x003A, "some_check", 1, "Unknown check function"),
    (0x003B, "another_check", 0, "Unknown check function"),
    // Combat
    (0x0090, "hit_object", 1, "Apply damage or hit effect"),
    // Searching
    (0x000E, "find_nearest", 3, "Find nearest object of type"),
    (0x0028, "count_objects", 4, "Count objects matching criteria"),
    (0x002B, "add_party_items", 5, "Add items to party inventory"),
    (0x002C, "remove_party_items", 5, "Remove items from party"),
    // Pathfinding
    (0x0036, "set_path_failure", 1, "Set path failure handler"),
    // Miscellaneous
    (0x0016, "set_item_quantity", 2, "Set item quantity"),
    (0x0017, "create_new_object", 2, "Advanced object creation"),
    (0x0029, "click_on_item", 1, "Simulate click on item"),
    (0x0037, "update_last_created", 1, "Update last created object"),
    (0x0041, "sprite_effect_at_position", 3, "Play sprite effect at position"),
    (0x0042, "set_timer", 2, "Set timer"),
    (0x0044, "get_timer", 1, "Get timer value"),
    (0x0047, "cause_light", 1, "Create light effect"),
    (0x004A, "set_attack_mode", 1, "Set NPC attack mode"),
    (0x004D, "get_barge", 1, "Get barge object"),
    (0x0052, "sit_down", 1, "Make NPC sit"),
    (0x0065, "die_roll", 2, "Roll dice"),
    (0x0067, "earthquake", 1, "Trigger earthquake effect"),
    (0x0069, "is_water", 1, "Check if position is water"),
    (0x006B, "get_lift", 1, "Get object lift/z-level"),
    (0x006D, "set_lift", 2, "Set object lift/z-level"),
    (0x0074, "lightning", 1, "Trigger lightning effect"),
    (0x0087, "flash_mouse", 0, "Flash mouse cursor"),
    (0x008D, "fade_palette", 1, "Fade screen palette"),
    (0x008E, "armageddon", 0, "Trigger armageddon"),
    (0x008F, "resurrection", 1, "Resurrect NPC"),
    (0x0093, "obj_sprite_effect", 2, "Play sprite effect on object"),
    (0x0096, "set_orrery", 1, "Set orrery state"),
];
