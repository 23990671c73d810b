//! Profile types collected from the runtime profiling endpoints.

use serde::{Deserialize, Serialize};

use std::fmt;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ProfileType {
    Cpu,
    Heap,
    Goroutine,
}

impl ProfileType {
    pub const ALL: [ProfileType; 3] = [Self::Cpu, Self::Heap, Self::Goroutine];

    /// Slot index inside a [`crate::Report`].
    pub fn index(self) -> usize {
        match self {
            Self::Cpu => 0,
            Self::Heap => 1,
            Self::Goroutine => 2,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Cpu => "cpu",
            Self::Heap => "heap",
            Self::Goroutine => "goroutine",
        }
    }

    /// Path under `/debug/pprof/` that serves this profile. CPU samples are
    /// bounded by `seconds`.
    pub fn endpoint(self, seconds: u64) -> String {
        match self {
            Self::Cpu => format!("profile?seconds={seconds}"),
            Self::Heap => "heap".to_string(),
            Self::Goroutine => "goroutine".to_string(),
        }
    }
}

impl fmt::Display for ProfileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl clap::ValueEnum for ProfileType {
    fn value_variants<'a>() -> &'a [Self] {
        &[Self::Cpu, Self::Heap, Self::Goroutine]
    }

    fn to_possible_value(&self) -> Option<clap::builder::PossibleValue> {
        Some(match self {
            Self::Cpu => clap::builder::PossibleValue::new("cpu").alias("profile"),
            Self::Heap => clap::builder::PossibleValue::new("heap"),
            Self::Goroutine => clap::builder::PossibleValue::new("goroutine"),
        })
    }
}

/// Empty selection means everything; repeated entries keep their first
/// position.
pub fn normalize_types(types: &[ProfileType]) -> Vec<ProfileType> {
    if types.is_empty() {
        return ProfileType::ALL.to_vec();
    }
    let mut out = Vec::with_capacity(types.len());
    for ty in types {
        if !out.contains(ty) {
            out.push(*ty);
        }
    }
    out
}
