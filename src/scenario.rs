// src/scenario.rs
//! Pure scenario selection over investigation evidence, and the menu /
//! conversation hand-off each scenario implies.
//!
//! Priority when several categories are present:
//! existing right > program > (proposal + similar demand) > similar demand
//! > proposal > nothing found.

use crate::knowledge::{GovernmentProgram, KnownRight};
use crate::ranking::RankedItem;
use crate::similarity::SimilarDemand;
use serde::Serialize;
use serde_json::json;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Scenario {
    /// A law already guarantees what the citizen asks for.
    ExistingRight,
    /// A government program already serves the need.
    ProgramExists,
    /// Nothing relevant exists yet.
    Greenfield,
    /// Others already reported the same problem.
    JoinExistingDemand,
    /// A bill on the topic is in progress.
    EngageProposal,
    /// Both a bill and a similar demand exist.
    DualPath,
}

impl Scenario {
    pub fn as_str(self) -> &'static str {
        match self {
            Scenario::ExistingRight => "existing_right",
            Scenario::ProgramExists => "program_exists",
            Scenario::Greenfield => "greenfield",
            Scenario::JoinExistingDemand => "join_existing_demand",
            Scenario::EngageProposal => "engage_proposal",
            Scenario::DualPath => "dual_path",
        }
    }
}

/// A law found for the report: from the item index or from the curated base.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "origin", rename_all = "snake_case")]
pub enum LawRecord {
    Indexed(RankedItem),
    Known(KnownRight),
}

impl LawRecord {
    pub fn name(&self) -> String {
        match self {
            LawRecord::Indexed(r) => r
                .item
                .title
                .clone()
                .unwrap_or_else(|| r.item.designation()),
            LawRecord::Known(k) => k.name.clone(),
        }
    }
}

/// Pick the scenario from which evidence categories are non-empty.
pub fn select(has_law: bool, has_program: bool, has_proposal: bool, has_similar: bool) -> Scenario {
    match (has_law, has_program, has_proposal, has_similar) {
        (true, _, _, _) => Scenario::ExistingRight,
        (false, true, _, _) => Scenario::ProgramExists,
        (false, false, true, true) => Scenario::DualPath,
        (false, false, false, true) => Scenario::JoinExistingDemand,
        (false, false, true, false) => Scenario::EngageProposal,
        (false, false, false, false) => Scenario::Greenfield,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MenuOption {
    CreateDemandAnyway,
    FullGuidance,
    ProgramSolvesIt,
    ProgramDoesNotSolveIt,
    CreateDemand,
    DraftLegislativeIdea,
    SupportExistingDemand,
    CommentOnProposal,
    CreateDemandToTrack,
    DraftAlternativeIdea,
    Cancel,
}

/// A menu line as offered to the citizen; `number` is 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MenuEntry {
    pub number: u8,
    pub option: MenuOption,
}

/// Which choice the conversation waits for next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationStage {
    AwaitingExistingRightChoice,
    AwaitingProgramConfirmation,
    AwaitingGreenfieldChoice,
    AwaitingJoinDemandChoice,
    AwaitingProposalChoice,
    AwaitingDualPathChoice,
}

/// At most one item per category, as shown to the citizen.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Evidence {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub law: Option<LawRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub program: Option<GovernmentProgram>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proposal: Option<RankedItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub similar_demand: Option<SimilarDemand>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NextState {
    pub stage: ConversationStage,
    /// Ids the next step needs (demand to join, item to support...).
    pub context: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScenarioSelection {
    pub scenario: Scenario,
    pub options: Vec<MenuEntry>,
    pub evidence: Evidence,
    pub next_state: NextState,
}

pub fn menu(scenario: Scenario) -> Vec<MenuEntry> {
    use MenuOption::*;
    let options: &[MenuOption] = match scenario {
        Scenario::ExistingRight => &[CreateDemandAnyway, FullGuidance, Cancel],
        Scenario::ProgramExists => &[ProgramSolvesIt, ProgramDoesNotSolveIt, Cancel],
        Scenario::Greenfield => &[CreateDemand, DraftLegislativeIdea, Cancel],
        Scenario::JoinExistingDemand => &[SupportExistingDemand, DraftLegislativeIdea, Cancel],
        Scenario::EngageProposal => &[
            CommentOnProposal,
            CreateDemandToTrack,
            DraftAlternativeIdea,
            Cancel,
        ],
        Scenario::DualPath => &[
            SupportExistingDemand,
            CommentOnProposal,
            DraftAlternativeIdea,
            Cancel,
        ],
    };
    options
        .iter()
        .zip(1u8..)
        .map(|(option, number)| MenuEntry {
            number,
            option: *option,
        })
        .collect()
}

fn stage(scenario: Scenario) -> ConversationStage {
    match scenario {
        Scenario::ExistingRight => ConversationStage::AwaitingExistingRightChoice,
        Scenario::ProgramExists => ConversationStage::AwaitingProgramConfirmation,
        Scenario::Greenfield => ConversationStage::AwaitingGreenfieldChoice,
        Scenario::JoinExistingDemand => ConversationStage::AwaitingJoinDemandChoice,
        Scenario::EngageProposal => ConversationStage::AwaitingProposalChoice,
        Scenario::DualPath => ConversationStage::AwaitingDualPathChoice,
    }
}

/// Select the scenario and package evidence, menu and next state.
pub fn package(
    laws: &[LawRecord],
    programs: &[GovernmentProgram],
    proposals: &[RankedItem],
    similar: &[SimilarDemand],
) -> ScenarioSelection {
    let scenario = select(
        !laws.is_empty(),
        !programs.is_empty(),
        !proposals.is_empty(),
        !similar.is_empty(),
    );

    let mut evidence = Evidence::default();
    match scenario {
        Scenario::ExistingRight => evidence.law = laws.first().cloned(),
        Scenario::ProgramExists => evidence.program = programs.first().cloned(),
        Scenario::JoinExistingDemand => evidence.similar_demand = similar.first().cloned(),
        Scenario::EngageProposal => evidence.proposal = proposals.first().cloned(),
        Scenario::DualPath => {
            evidence.proposal = proposals.first().cloned();
            evidence.similar_demand = similar.first().cloned();
        }
        Scenario::Greenfield => {}
    }

    let context = json!({
        "scenario": scenario.as_str(),
        "law_name": evidence.law.as_ref().map(LawRecord::name),
        "program_id": evidence.program.as_ref().map(|p| p.id.clone()),
        "program_name": evidence.program.as_ref().map(|p| p.name.clone()),
        "proposal_external_id": evidence.proposal.as_ref().map(|p| p.item.external_id.clone()),
        "proposal_cache_id": evidence.proposal.as_ref().and_then(|p| p.cache_id),
        "demand_id": evidence.similar_demand.as_ref().map(|d| d.id),
    });

    ScenarioSelection {
        scenario,
        options: menu(scenario),
        evidence,
        next_state: NextState {
            stage: stage(scenario),
            context,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_table() {
        assert_eq!(select(true, true, true, true), Scenario::ExistingRight);
        assert_eq!(select(false, true, true, true), Scenario::ProgramExists);
        assert_eq!(select(false, false, true, true), Scenario::DualPath);
        assert_eq!(select(false, false, false, true), Scenario::JoinExistingDemand);
        assert_eq!(select(false, false, true, false), Scenario::EngageProposal);
        assert_eq!(select(false, false, false, false), Scenario::Greenfield);
    }

    #[test]
    fn greenfield_package_has_no_evidence() {
        let sel = package(&[], &[], &[], &[]);
        assert_eq!(sel.scenario, Scenario::Greenfield);
        assert_eq!(sel.evidence, Evidence::default());
        let opts: Vec<MenuOption> = sel.options.iter().map(|e| e.option).collect();
        assert_eq!(
            opts,
            vec![MenuOption::CreateDemand, MenuOption::DraftLegislativeIdea, MenuOption::Cancel]
        );
        assert_eq!(sel.options[0].number, 1);
        assert_eq!(sel.options[2].number, 3);
        assert_eq!(sel.next_state.stage, ConversationStage::AwaitingGreenfieldChoice);
        assert_eq!(sel.next_state.context["scenario"], "greenfield");
    }
}
