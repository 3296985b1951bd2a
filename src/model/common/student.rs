use serde::{Deserialize, Serialize};

/// Academic departments that voters and candidates belong to.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Department {
    Bba,
    Bcom,
    Ba,
    Bca,
    Bsc,
}

/// Year of study.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AcademicLevel {
    #[serde(rename = "First Year")]
    FirstYear,
    #[serde(rename = "Second Year")]
    SecondYear,
    #[serde(rename = "Third Year")]
    ThirdYear,
    #[serde(rename = "Fourth Year")]
    FourthYear,
}
