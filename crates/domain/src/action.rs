//! Wizard action identifiers.
//!
//! Every mutation of a session flows through one of these actions. The
//! dispatcher holds an explicit action → handler map; gating is decided by
//! [`ActionId::permitted_in`] against the session's current stage.

use serde::{Deserialize, Serialize};

use crate::stage::WizardStage;

/// Action domains, used for routing and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionDomain {
    Bootstrap,
    Navigation,
    Language,
    Translation,
    Contact,
    Education,
    JobPosting,
    Work,
    Further,
    Skills,
    Review,
    CoverLetter,
}

/// Closed set of wizard actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionId {
    /// Bootstrap: ingest the uploaded document and create the session.
    /// Rejected when the session already exists.
    #[serde(rename = "extract_and_store_cv")]
    ExtractAndStoreCv,
    #[serde(rename = "WIZARD_GOTO_STAGE")]
    WizardGotoStage,
    #[serde(rename = "LANGUAGE_SELECT")]
    LanguageSelect,
    #[serde(rename = "TRANSLATE_RUN")]
    TranslateRun,
    #[serde(rename = "TRANSLATE_ACCEPT")]
    TranslateAccept,
    #[serde(rename = "CONTACT_UPDATE")]
    ContactUpdate,
    #[serde(rename = "CONTACT_CONFIRM")]
    ContactConfirm,
    #[serde(rename = "EDUCATION_UPDATE")]
    EducationUpdate,
    #[serde(rename = "EDUCATION_TRANSLATE")]
    EducationTranslate,
    #[serde(rename = "EDUCATION_CONFIRM")]
    EducationConfirm,
    #[serde(rename = "JOB_POSTING_EXTRACT")]
    JobPostingExtract,
    #[serde(rename = "WORK_TAILOR_RUN")]
    WorkTailorRun,
    #[serde(rename = "WORK_TAILOR_ACCEPT")]
    WorkTailorAccept,
    #[serde(rename = "WORK_TAILOR_EDIT")]
    WorkTailorEdit,
    #[serde(rename = "FURTHER_RUN")]
    FurtherRun,
    #[serde(rename = "FURTHER_ACCEPT")]
    FurtherAccept,
    #[serde(rename = "SKILLS_RUN")]
    SkillsRun,
    #[serde(rename = "SKILLS_ACCEPT")]
    SkillsAccept,
    #[serde(rename = "REVIEW_VALIDATE")]
    ReviewValidate,
    #[serde(rename = "COVER_LETTER_RUN")]
    CoverLetterRun,
}

impl ActionId {
    pub fn as_wire(&self) -> &'static str {
        match self {
            ActionId::ExtractAndStoreCv => "extract_and_store_cv",
            ActionId::WizardGotoStage => "WIZARD_GOTO_STAGE",
            ActionId::LanguageSelect => "LANGUAGE_SELECT",
            ActionId::TranslateRun => "TRANSLATE_RUN",
            ActionId::TranslateAccept => "TRANSLATE_ACCEPT",
            ActionId::ContactUpdate => "CONTACT_UPDATE",
            ActionId::ContactConfirm => "CONTACT_CONFIRM",
            ActionId::EducationUpdate => "EDUCATION_UPDATE",
            ActionId::EducationTranslate => "EDUCATION_TRANSLATE",
            ActionId::EducationConfirm => "EDUCATION_CONFIRM",
            ActionId::JobPostingExtract => "JOB_POSTING_EXTRACT",
            ActionId::WorkTailorRun => "WORK_TAILOR_RUN",
            ActionId::WorkTailorAccept => "WORK_TAILOR_ACCEPT",
            ActionId::WorkTailorEdit => "WORK_TAILOR_EDIT",
            ActionId::FurtherRun => "FURTHER_RUN",
            ActionId::FurtherAccept => "FURTHER_ACCEPT",
            ActionId::SkillsRun => "SKILLS_RUN",
            ActionId::SkillsAccept => "SKILLS_ACCEPT",
            ActionId::ReviewValidate => "REVIEW_VALIDATE",
            ActionId::CoverLetterRun => "COVER_LETTER_RUN",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        serde_json::from_value(serde_json::Value::String(s.to_owned())).ok()
    }

    pub fn domain(&self) -> ActionDomain {
        match self {
            ActionId::ExtractAndStoreCv => ActionDomain::Bootstrap,
            ActionId::WizardGotoStage => ActionDomain::Navigation,
            ActionId::LanguageSelect => ActionDomain::Language,
            ActionId::TranslateRun | ActionId::TranslateAccept => ActionDomain::Translation,
            ActionId::ContactUpdate | ActionId::ContactConfirm => ActionDomain::Contact,
            ActionId::EducationUpdate
            | ActionId::EducationTranslate
            | ActionId::EducationConfirm => ActionDomain::Education,
            ActionId::JobPostingExtract => ActionDomain::JobPosting,
            ActionId::WorkTailorRun | ActionId::WorkTailorAccept | ActionId::WorkTailorEdit => {
                ActionDomain::Work
            }
            ActionId::FurtherRun | ActionId::FurtherAccept => ActionDomain::Further,
            ActionId::SkillsRun | ActionId::SkillsAccept => ActionDomain::Skills,
            ActionId::ReviewValidate => ActionDomain::Review,
            ActionId::CoverLetterRun => ActionDomain::CoverLetter,
        }
    }

    /// The stage this action belongs to. `None` = permitted everywhere.
    pub fn home_stage(&self) -> Option<WizardStage> {
        match self {
            ActionId::ExtractAndStoreCv | ActionId::WizardGotoStage => None,
            ActionId::LanguageSelect => Some(WizardStage::LanguageSelection),
            ActionId::TranslateRun | ActionId::TranslateAccept => {
                Some(WizardStage::BulkTranslation)
            }
            ActionId::ContactUpdate | ActionId::ContactConfirm => Some(WizardStage::Contact),
            ActionId::EducationUpdate
            | ActionId::EducationTranslate
            | ActionId::EducationConfirm => Some(WizardStage::Education),
            ActionId::JobPostingExtract => Some(WizardStage::JobPosting),
            ActionId::WorkTailorRun | ActionId::WorkTailorAccept | ActionId::WorkTailorEdit => {
                Some(WizardStage::WorkExperience)
            }
            ActionId::FurtherRun | ActionId::FurtherAccept => {
                Some(WizardStage::FurtherExperience)
            }
            ActionId::SkillsRun | ActionId::SkillsAccept => Some(WizardStage::Skills),
            ActionId::ReviewValidate => Some(WizardStage::ReviewFinal),
            ActionId::CoverLetterRun => Some(WizardStage::CoverLetter),
        }
    }

    /// Gating rule: the action is permitted in its home stage, or in a stage
    /// from which the wizard may jump to the home stage (the bounded
    /// allow-list in [`WizardStage::can_jump_to`]).
    pub fn permitted_in(&self, current: WizardStage) -> bool {
        match self.home_stage() {
            None => true,
            Some(home) => current == home || current.can_jump_to(home),
        }
    }
}

impl std::fmt::Display for ActionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_wire())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_names_round_trip() {
        for action in [
            ActionId::ExtractAndStoreCv,
            ActionId::WorkTailorRun,
            ActionId::WizardGotoStage,
        ] {
            assert_eq!(ActionId::parse(action.as_wire()), Some(action));
        }
        assert_eq!(ActionId::parse("NOT_AN_ACTION"), None);
    }

    #[test]
    fn work_actions_not_permitted_in_contact() {
        // Contact cannot jump forward to work-experience directly.
        assert!(!ActionId::WorkTailorRun.permitted_in(WizardStage::Contact));
        assert!(ActionId::WorkTailorRun.permitted_in(WizardStage::WorkExperience));
    }

    #[test]
    fn navigation_permitted_everywhere() {
        for stage in WizardStage::ORDER {
            assert!(ActionId::WizardGotoStage.permitted_in(stage));
        }
    }
}
