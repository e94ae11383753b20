//! The closed behavior vocabulary.
//!
//! Fourteen labels, partitioned into nine visual and five audio behaviors.
//! The definitions table drives both prompt construction and modality
//! inference for model output that omits the modality field.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Observation channel a behavior is detected on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Modality {
    Visual,
    Audio,
}

impl Modality {
    pub fn as_str(&self) -> &'static str {
        match self {
            Modality::Visual => "visual",
            Modality::Audio => "audio",
        }
    }

    /// Parse a modality string, tolerating case and surrounding whitespace.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "visual" => Some(Modality::Visual),
            "audio" => Some(Modality::Audio),
            _ => None,
        }
    }
}

impl fmt::Display for Modality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One of the fourteen closed-vocabulary behavior labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Behavior {
    // Visual
    BodyRocking,
    HandFlapping,
    HeadBanging,
    Spinning,
    ToeWalking,
    CoveringEars,
    CoveringEyes,
    RepetitiveJumping,
    SelfHitting,
    // Audio
    Crying,
    Screaming,
    Laughing,
    Echolalia,
    Humming,
}

/// Entry in the static vocabulary table.
pub struct BehaviorDefinition {
    pub behavior: Behavior,
    pub label: &'static str,
    pub modality: Modality,
    /// One-sentence clinical definition, used verbatim in prompts.
    pub definition: &'static str,
}

/// The full vocabulary with clinical definitions, in prompt order.
pub const BEHAVIOR_DEFINITIONS: &[BehaviorDefinition] = &[
    BehaviorDefinition {
        behavior: Behavior::BodyRocking,
        label: "body-rocking",
        modality: Modality::Visual,
        definition: "Rhythmic back-and-forth or side-to-side movement of the torso while seated or standing.",
    },
    BehaviorDefinition {
        behavior: Behavior::HandFlapping,
        label: "hand-flapping",
        modality: Modality::Visual,
        definition: "Rapid repetitive up-and-down or rotary movement of the hands or arms, often at shoulder height.",
    },
    BehaviorDefinition {
        behavior: Behavior::HeadBanging,
        label: "head-banging",
        modality: Modality::Visual,
        definition: "Striking the head against a surface, object, or the child's own body.",
    },
    BehaviorDefinition {
        behavior: Behavior::Spinning,
        label: "spinning",
        modality: Modality::Visual,
        definition: "Turning the whole body in circles repeatedly without an apparent play goal.",
    },
    BehaviorDefinition {
        behavior: Behavior::ToeWalking,
        label: "toe-walking",
        modality: Modality::Visual,
        definition: "Walking on the balls of the feet or toes with the heels off the ground.",
    },
    BehaviorDefinition {
        behavior: Behavior::CoveringEars,
        label: "covering-ears",
        modality: Modality::Visual,
        definition: "Pressing hands or objects over the ears, typically in response to sound.",
    },
    BehaviorDefinition {
        behavior: Behavior::CoveringEyes,
        label: "covering-eyes",
        modality: Modality::Visual,
        definition: "Shielding or pressing on the eyes with hands, fingers, or objects.",
    },
    BehaviorDefinition {
        behavior: Behavior::RepetitiveJumping,
        label: "repetitive-jumping",
        modality: Modality::Visual,
        definition: "Jumping in place repeatedly in a rhythmic, non-play pattern.",
    },
    BehaviorDefinition {
        behavior: Behavior::SelfHitting,
        label: "self-hitting",
        modality: Modality::Visual,
        definition: "Hitting, slapping, or biting the child's own body.",
    },
    BehaviorDefinition {
        behavior: Behavior::Crying,
        label: "crying",
        modality: Modality::Audio,
        definition: "Audible crying or sobbing vocalization.",
    },
    BehaviorDefinition {
        behavior: Behavior::Screaming,
        label: "screaming",
        modality: Modality::Audio,
        definition: "High-intensity screaming or shrieking vocalization.",
    },
    BehaviorDefinition {
        behavior: Behavior::Laughing,
        label: "laughing",
        modality: Modality::Audio,
        definition: "Audible laughter, including context-inappropriate laughing episodes.",
    },
    BehaviorDefinition {
        behavior: Behavior::Echolalia,
        label: "echolalia",
        modality: Modality::Audio,
        definition: "Echoing or repeating words or phrases heard from another speaker or media.",
    },
    BehaviorDefinition {
        behavior: Behavior::Humming,
        label: "humming",
        modality: Modality::Audio,
        definition: "Sustained humming, droning, or other repetitive non-word vocalization.",
    },
];

impl Behavior {
    /// Canonical kebab-case label.
    pub fn label(&self) -> &'static str {
        self.definition_entry().label
    }

    /// The modality this behavior belongs to in the vocabulary partition.
    pub fn modality(&self) -> Modality {
        self.definition_entry().modality
    }

    /// One-sentence clinical definition.
    pub fn definition(&self) -> &'static str {
        self.definition_entry().definition
    }

    fn definition_entry(&self) -> &'static BehaviorDefinition {
        BEHAVIOR_DEFINITIONS
            .iter()
            .find(|d| d.behavior == *self)
            .unwrap_or(&BEHAVIOR_DEFINITIONS[0])
    }

    /// Parse a label, tolerating case and surrounding whitespace.
    /// Returns `None` for anything outside the closed vocabulary.
    pub fn parse(s: &str) -> Option<Self> {
        let needle = s.trim().to_lowercase();
        BEHAVIOR_DEFINITIONS
            .iter()
            .find(|d| d.label == needle)
            .map(|d| d.behavior)
    }

    /// All labels of one modality, in vocabulary order.
    pub fn labels_for(modality: Modality) -> Vec<&'static str> {
        BEHAVIOR_DEFINITIONS
            .iter()
            .filter(|d| d.modality == modality)
            .map(|d| d.label)
            .collect()
    }
}

impl fmt::Display for Behavior {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}
