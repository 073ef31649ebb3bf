//! Reverse lookup for the hashed names in console model files.
//!
//! Console builds strip plaintext piece/animation/socket names and keep a
//! 32-bit hash seeded by a per-file magic number from the header. The hash
//! is not reversible, so recovery works from a catalog of names observed in
//! shipped game data: hash every known name with the file's magic and match
//! against the hashes read from disk. A miss is not an error; callers fall
//! back to synthetic names.

use std::collections::HashMap;

/// Which name table a hash belongs to. The same plaintext hashes to the
/// same value in every category; the split exists to keep collisions from
/// leaking across unrelated namespaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NameKind {
    Piece,
    Node,
    Animation,
    Socket,
}

/// Seeded fold over the uppercased bytes of `name`.
pub fn hash_name(magic: u32, name: &str) -> u32 {
    name.bytes().fold(magic, |h, b| {
        h.wrapping_mul(31).wrapping_add(u32::from(b.to_ascii_uppercase()))
    })
}

const PIECE_NAMES: &[&str] = &[
    "Body", "Head", "Face", "Hair", "Hat", "Helmet", "Hands", "Arms", "Legs",
    "Feet", "Torso", "Chest", "Holster", "Backpack", "Goggles", "Gun",
    "Stock", "Barrel", "Clip", "Scope", "Silencer", "Blade", "Handle",
];

const NODE_NAMES: &[&str] = &[
    "root", "null", "torso", "upper_torso", "lower_torso", "neck", "head",
    "left_shoulder", "right_shoulder", "left_arm", "right_arm",
    "left_elbow", "right_elbow", "left_hand", "right_hand", "pelvis",
    "left_leg", "right_leg", "left_knee", "right_knee", "left_foot",
    "right_foot", "muzzle",
];

const ANIMATION_NAMES: &[&str] = &[
    "base", "idle_1", "idle_2", "walk", "run", "jump", "crouch",
    "crouch_walk", "swim", "climb", "fire", "fire_stand", "fire_crouch",
    "reload", "select", "deselect", "throw", "melee", "talk", "pain_1",
    "pain_2", "death_1", "death_2", "death_3", "victory",
];

const SOCKET_NAMES: &[&str] = &[
    "RightHand", "LeftHand", "Head", "Eyes", "Mouth", "Back", "Chest",
    "Hip", "Holster", "Muzzle", "Breach", "Flash", "Smoke", "Attachment",
    "Turret", "Snowmobile", "Motorcycle",
];

const CATALOG: &[(NameKind, &[&str])] = &[
    (NameKind::Piece, PIECE_NAMES),
    (NameKind::Node, NODE_NAMES),
    (NameKind::Animation, ANIMATION_NAMES),
    (NameKind::Socket, SOCKET_NAMES),
];

/// Per-file reverse hash table.
///
/// One instance is built per read from the header magic; lookups borrow it
/// read-only afterwards.
#[derive(Debug)]
pub struct HashLookup {
    magic: u32,
    names: HashMap<(NameKind, u32), &'static str>,
}

impl HashLookup {
    /// Builds the reverse table for a file's magic number. Later catalog
    /// entries win when two names collide under the same magic.
    pub fn new(magic: u32) -> Self {
        let mut names = HashMap::new();
        for &(kind, list) in CATALOG {
            for &name in list {
                names.insert((kind, hash_name(magic, name)), name);
            }
        }
        Self { magic, names }
    }

    pub fn magic(&self) -> u32 {
        self.magic
    }

    /// Returns the plaintext previously observed for `hash`, if any.
    pub fn lookup(&self, kind: NameKind, hash: u32) -> Option<&'static str> {
        self.names.get(&(kind, hash)).copied()
    }
}
