// tests/scenario_matrix.rs
mod common;

use chrono::Utc;
use common::bill;
use coral_investigator::knowledge::{default_programs, default_rights};
use coral_investigator::ranking::RankedItem;
use coral_investigator::scenario::{package, ConversationStage, LawRecord, MenuOption, Scenario};
use coral_investigator::similarity::SimilarDemand;
use coral_investigator::sources::SourceKind;
use coral_investigator::ScopeLevel;
use uuid::Uuid;

fn proposal() -> RankedItem {
    RankedItem {
        item: bill(SourceKind::Chamber, "555", "555", 2025, "Dispõe sobre manutenção de calçadas"),
        score: 8,
        matched: vec!["calçada".into()],
        cache_id: Some(Uuid::new_v4()),
    }
}

fn demand() -> SimilarDemand {
    SimilarDemand {
        id: Uuid::new_v4(),
        title: "Calçada quebrada na Rua das Flores".into(),
        description: "Calçada quebrada há meses".into(),
        theme: "zeladoria".into(),
        scope_level: ScopeLevel::Local,
        location: None,
        supporters_count: 12,
        created_at: Utc::now(),
        similarity: 0.91,
        distance_km: Some(0.4),
    }
}

fn options(s: Scenario, laws: &[LawRecord], programs: bool, proposals: &[RankedItem], similar: &[SimilarDemand]) -> Vec<MenuOption> {
    let programs = if programs { default_programs() } else { vec![] };
    let sel = package(laws, &programs, proposals, similar);
    assert_eq!(sel.scenario, s);
    sel.options.iter().map(|e| e.option).collect()
}

#[test]
fn existing_right_dominates_everything() {
    let laws = vec![LawRecord::Known(default_rights().remove(0))];
    let sel = package(&laws, &default_programs(), &[proposal()], &[demand()]);
    assert_eq!(sel.scenario, Scenario::ExistingRight);
    assert!(sel.evidence.law.is_some());
    assert!(sel.evidence.program.is_none());
    assert!(sel.evidence.proposal.is_none());
    assert_eq!(sel.next_state.stage, ConversationStage::AwaitingExistingRightChoice);
    assert_eq!(
        sel.next_state.context["law_name"],
        "Código de Defesa do Consumidor (Lei 8.078/1990)"
    );
}

#[test]
fn program_beats_proposals_and_demands() {
    let sel = package(&[], &default_programs(), &[proposal()], &[demand()]);
    assert_eq!(sel.scenario, Scenario::ProgramExists);
    assert_eq!(sel.next_state.context["program_id"], "farmacia_popular");
    assert_eq!(sel.next_state.stage, ConversationStage::AwaitingProgramConfirmation);
}

#[test]
fn dual_path_carries_both_ids() {
    let p = proposal();
    let d = demand();
    let sel = package(&[], &[], &[p.clone()], &[d.clone()]);
    assert_eq!(sel.scenario, Scenario::DualPath);
    assert_eq!(sel.evidence.proposal.as_ref().map(|x| x.item.external_id.as_str()), Some("camara:555"));
    assert_eq!(sel.evidence.similar_demand.as_ref().map(|x| x.id), Some(d.id));

    let ctx = &sel.next_state.context;
    assert_eq!(ctx["demand_id"], d.id.to_string());
    assert_eq!(ctx["proposal_cache_id"], p.cache_id.unwrap().to_string());
    assert_eq!(ctx["proposal_external_id"], "camara:555");
}

#[test]
fn menus_per_scenario() {
    use MenuOption::*;
    assert_eq!(
        options(Scenario::JoinExistingDemand, &[], false, &[], &[demand()]),
        vec![SupportExistingDemand, DraftLegislativeIdea, Cancel]
    );
    assert_eq!(
        options(Scenario::EngageProposal, &[], false, &[proposal()], &[]),
        vec![CommentOnProposal, CreateDemandToTrack, DraftAlternativeIdea, Cancel]
    );
    assert_eq!(
        options(Scenario::DualPath, &[], false, &[proposal()], &[demand()]),
        vec![SupportExistingDemand, CommentOnProposal, DraftAlternativeIdea, Cancel]
    );
    assert_eq!(
        options(Scenario::ProgramExists, &[], true, &[], &[]),
        vec![ProgramSolvesIt, ProgramDoesNotSolveIt, Cancel]
    );
    let laws = vec![LawRecord::Known(default_rights().remove(1))];
    assert_eq!(
        options(Scenario::ExistingRight, &laws, false, &[], &[]),
        vec![CreateDemandAnyway, FullGuidance, Cancel]
    );
}

#[test]
fn selection_serializes_for_the_conversation_layer() {
    let sel = package(&[], &[], &[], &[demand()]);
    let v = serde_json::to_value(&sel).unwrap();
    assert_eq!(v["scenario"], "join_existing_demand");
    assert_eq!(v["options"][0]["number"], 1);
    assert_eq!(v["options"][0]["option"], "support_existing_demand");
    assert_eq!(v["next_state"]["stage"], "awaiting_join_demand_choice");
    assert_eq!(v["evidence"]["similar_demand"]["scope_level"], 1);
    assert!(v["evidence"].get("law").is_none());
}
