//! Collaboration resolution against a scripted model.

use std::sync::Arc;

use teamsim_agents::{
    AgentRole, GenerationError, MarkerParser, OrchestrationError, Orchestrator, ProjectContext,
    ScriptedGenerator, Session,
};

fn orchestrator(generator: &Arc<ScriptedGenerator>) -> Orchestrator {
    Orchestrator::new(generator.clone(), MarkerParser::default())
}

#[tokio::test]
async fn every_role_answers_alone_without_markers() {
    for role in AgentRole::ALL {
        let generator = Arc::new(ScriptedGenerator::new());
        let mut session = Session::new();
        let reply = orchestrator(&generator)
            .handle_message(&mut session, "Status update please", role.key(), None)
            .await
            .unwrap();
        assert_eq!(reply.roles(), vec![role]);
        assert!(reply.text().starts_with(&format!("{}: ", role.display_label())));
        assert_eq!(generator.called_roles(), vec![role]);
    }
}

#[tokio::test]
async fn chain_resolves_in_order() {
    let generator = Arc::new(
        ScriptedGenerator::new()
            .with_reply(AgentRole::Pm, "Kickoff done.\nDeveloper -> Task for Developer [estimate the work]")
            .with_reply(AgentRole::Dev, "Two sprints.\nTester -> Task for Tester [plan regression]")
            .with_reply(AgentRole::Tester, "Regression plan drafted."),
    );
    let mut session = Session::new();
    let reply = orchestrator(&generator)
        .handle_message(&mut session, "Plan the release", "pm", None)
        .await
        .unwrap();

    assert_eq!(reply.roles(), vec![AgentRole::Pm, AgentRole::Dev, AgentRole::Tester]);
    let text = reply.text();
    let blocks: Vec<&str> = text.split("\n\n").collect();
    assert_eq!(blocks.len(), 3);
    assert!(blocks[0].starts_with("PM: Kickoff done."));
    assert!(blocks[1].starts_with("DEVELOPER: Two sprints."));
    assert_eq!(blocks[2], "TESTER: Regression plan drafted.");
}

#[tokio::test]
async fn cycle_yields_two_contributions() {
    let generator = Arc::new(
        ScriptedGenerator::new()
            .with_reply(AgentRole::Dev, "Need infra.\n[NEED_DEVOPS: provision a database]")
            .with_reply(AgentRole::Devops, "Need schema.\n[NEED_DEV: share the schema]"),
    );
    let mut session = Session::new();
    let reply = orchestrator(&generator)
        .handle_message(&mut session, "Set up storage", "dev", None)
        .await
        .unwrap();

    assert_eq!(reply.roles(), vec![AgentRole::Dev, AgentRole::Devops]);
    assert_eq!(generator.called_roles(), vec![AgentRole::Dev, AgentRole::Devops]);
}

#[tokio::test]
async fn heavily_requested_role_answers_once() {
    let generator = Arc::new(
        ScriptedGenerator::new()
            .with_reply(
                AgentRole::Pm,
                "Team, please weigh in.\n[NEED_DEV: estimate]\n[NEED_TEST: risks]\n[NEED_UX: mockups]",
            )
            .with_reply(AgentRole::Dev, "Estimate ready.\n[NEED_TEST: unit coverage]\n[NEED_PM: scope]")
            .with_reply(AgentRole::Tester, "Risks listed.\n[NEED_DEV: fix flaky test]\n[NEED_UX: a11y]")
            .with_reply(AgentRole::Uxd, "Mockups attached.\n[NEED_TEST: usability]\n[NEED_BA: personas]"),
    );
    let mut session = Session::new();
    let reply = orchestrator(&generator)
        .handle_message(&mut session, "New feature", "pm", None)
        .await
        .unwrap();

    assert_eq!(
        reply.roles(),
        vec![AgentRole::Pm, AgentRole::Dev, AgentRole::Tester, AgentRole::Uxd, AgentRole::Ba]
    );
    let mut seen = reply.roles();
    seen.sort();
    seen.dedup();
    assert_eq!(seen.len(), reply.contributions.len());
}

#[tokio::test]
async fn unknown_start_role_invokes_nobody() {
    let generator = Arc::new(ScriptedGenerator::new());
    let mut session = Session::new();
    let err = orchestrator(&generator)
        .handle_message(&mut session, "hello", "architect", None)
        .await
        .unwrap_err();

    assert!(matches!(err, OrchestrationError::UnknownRole(_)));
    assert!(err.is_input_error());
    assert_eq!(err.to_string(), "Invalid agent type: architect");
    assert!(generator.calls().is_empty());
}

#[tokio::test]
async fn blank_message_rejected() {
    let generator = Arc::new(ScriptedGenerator::new());
    let mut session = Session::new();
    let err = orchestrator(&generator)
        .handle_message(&mut session, "  \n", "pm", None)
        .await
        .unwrap_err();
    assert!(matches!(err, OrchestrationError::EmptyMessage));
    assert!(generator.calls().is_empty());
}

#[tokio::test]
async fn starting_failure_stops_the_round() {
    let generator = Arc::new(
        ScriptedGenerator::new()
            .with_failure(AgentRole::Pm, GenerationError::RateLimited("429".into())),
    );
    let mut session = Session::new();
    let err = orchestrator(&generator)
        .handle_message(&mut session, "Plan it", "pm", None)
        .await
        .unwrap_err();

    match err {
        OrchestrationError::StartingAgent { role, source } => {
            assert_eq!(role, AgentRole::Pm);
            assert!(source.user_message().contains("rate limit"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(generator.called_roles(), vec![AgentRole::Pm]);
}

#[tokio::test]
async fn failed_collaborator_is_omitted() {
    let generator = Arc::new(
        ScriptedGenerator::new()
            .with_reply(AgentRole::Pm, "Splitting work.\n[NEED_DEV: backend]\n[NEED_DEVOPS: deploy]")
            .with_failure(AgentRole::Dev, GenerationError::Timeout)
            .with_reply(AgentRole::Devops, "Pipeline configured.\n[NEED_BA: cost estimate]")
            .with_reply(AgentRole::Ba, "Costs are within budget."),
    );
    let mut session = Session::new();
    let reply = orchestrator(&generator)
        .handle_message(&mut session, "Ship v1", "pm", None)
        .await
        .unwrap();

    assert_eq!(reply.roles(), vec![AgentRole::Pm, AgentRole::Devops, AgentRole::Ba]);
    assert!(!reply.text().contains("DEVELOPER"));
}

#[tokio::test]
async fn collaborators_see_requests_responses_and_project() {
    let generator = Arc::new(
        ScriptedGenerator::new()
            .with_reply(AgentRole::Ba, "Requirements set.\nUX Designer -> Task for UX Designer [draft onboarding]")
            .with_reply(AgentRole::Uxd, "Onboarding flow drafted."),
    );
    let project = ProjectContext {
        name: "Atlas".into(),
        description: "Travel planner".into(),
        status: "active".into(),
        ..Default::default()
    };
    let mut session = Session::new();
    orchestrator(&generator)
        .handle_message(&mut session, "Scope onboarding", "ba", Some(&project))
        .await
        .unwrap();

    let calls = generator.calls();
    assert_eq!(calls.len(), 2);
    assert!(calls[0].prompt.contains("Name: Atlas"));
    let ux_prompt = &calls[1].prompt;
    assert!(ux_prompt.contains("Previous agent responses:\nBA: Requirements set."));
    assert!(ux_prompt.contains("Specific requests:\n- draft onboarding"));
    assert!(ux_prompt.contains("Description: Travel planner"));
    assert_eq!(calls[1].temperature, 0.7);
}

#[tokio::test]
async fn memory_persists_within_a_session() {
    let generator = Arc::new(ScriptedGenerator::new());
    let orch = orchestrator(&generator);
    let mut session = Session::new();

    orch.handle_message(&mut session, "first question", "tester", None).await.unwrap();
    orch.handle_message(&mut session, "second question", "tester", None).await.unwrap();

    let calls = generator.calls();
    assert!(!calls[0].prompt.contains("Previous conversation history"));
    assert!(calls[1].prompt.contains("User: first question"));
    assert_eq!(session.memory(AgentRole::Tester).unwrap().len(), 4);
    assert!(session.memory(AgentRole::Pm).is_none());
}
