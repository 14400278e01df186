//! Fixed taxonomies used to file questions and study materials. Every variant
//! round-trips through its kebab-case slug, which is also what the database
//! stores and what query strings carry.

use core::{fmt, str::FromStr};
use serde::{Deserialize, Serialize};

/// The slug did not name any known variant.
#[derive(Debug, PartialEq, Eq)]
pub struct UnknownSlug;

impl fmt::Display for UnknownSlug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("unknown category slug")
    }
}

/// Subspecialty a quiz question belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Category {
    Headache,
    Stroke,
    SleepDisorders,
    MovementDisorders,
    Dementia,
    Dizziness,
    Neuromuscular,
    CnsInfection,
    Epilepsy,
    NeurocriticalCare,
}

impl Category {
    pub const ALL: [Self; 10] = [
        Self::Headache,
        Self::Stroke,
        Self::SleepDisorders,
        Self::MovementDisorders,
        Self::Dementia,
        Self::Dizziness,
        Self::Neuromuscular,
        Self::CnsInfection,
        Self::Epilepsy,
        Self::NeurocriticalCare,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Headache => "headache",
            Self::Stroke => "stroke",
            Self::SleepDisorders => "sleep-disorders",
            Self::MovementDisorders => "movement-disorders",
            Self::Dementia => "dementia",
            Self::Dizziness => "dizziness",
            Self::Neuromuscular => "neuromuscular",
            Self::CnsInfection => "cns-infection",
            Self::Epilepsy => "epilepsy",
            Self::NeurocriticalCare => "neurocritical-care",
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Headache => "Headache",
            Self::Stroke => "Stroke",
            Self::SleepDisorders => "Sleep Disorders",
            Self::MovementDisorders => "Movement Disorders",
            Self::Dementia => "Dementia",
            Self::Dizziness => "Dizziness",
            Self::Neuromuscular => "Neuromuscular",
            Self::CnsInfection => "CNS Infection",
            Self::Epilepsy => "Epilepsy",
            Self::NeurocriticalCare => "Neurocritical Care",
        }
    }
}

impl FromStr for Category {
    type Err = UnknownSlug;
    fn from_str(slug: &str) -> Result<Self, Self::Err> {
        Self::ALL.into_iter().find(|cat| cat.as_str() == slug).ok_or(UnknownSlug)
    }
}

/// Clinical neurophysiology test a study material covers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum TestKind {
    Ncs,
    Emg,
    Ep,
    Ans,
    Eeg,
    Tcd,
    Carotid,
    VogVng,
    Snsb,
    Gait,
}

impl TestKind {
    pub const ALL: [Self; 10] = [
        Self::Ncs,
        Self::Emg,
        Self::Ep,
        Self::Ans,
        Self::Eeg,
        Self::Tcd,
        Self::Carotid,
        Self::VogVng,
        Self::Snsb,
        Self::Gait,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ncs => "ncs",
            Self::Emg => "emg",
            Self::Ep => "ep",
            Self::Ans => "ans",
            Self::Eeg => "eeg",
            Self::Tcd => "tcd",
            Self::Carotid => "carotid",
            Self::VogVng => "vog-vng",
            Self::Snsb => "snsb",
            Self::Gait => "gait",
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Ncs => "Nerve Conduction Study",
            Self::Emg => "Needle Electromyography",
            Self::Ep => "Evoked Potentials",
            Self::Ans => "Autonomic Function Tests",
            Self::Eeg => "Electroencephalography",
            Self::Tcd => "Transcranial Doppler",
            Self::Carotid => "Carotid Ultrasound",
            Self::VogVng => "VOG & VNG",
            Self::Snsb => "SNSB",
            Self::Gait => "Gait Analysis",
        }
    }
}

impl FromStr for TestKind {
    type Err = UnknownSlug;
    fn from_str(slug: &str) -> Result<Self, Self::Err> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == slug).ok_or(UnknownSlug)
    }
}

/// Presentation flavor of a study material.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum MaterialKind {
    #[default]
    Lecture,
    Case,
    Reference,
    Video,
}

impl MaterialKind {
    pub const ALL: [Self; 4] = [Self::Lecture, Self::Case, Self::Reference, Self::Video];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Lecture => "lecture",
            Self::Case => "case",
            Self::Reference => "reference",
            Self::Video => "video",
        }
    }
}

impl FromStr for MaterialKind {
    type Err = UnknownSlug;
    fn from_str(slug: &str) -> Result<Self, Self::Err> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == slug).ok_or(UnknownSlug)
    }
}
