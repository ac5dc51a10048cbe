use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use lexlead_rag::chains::{QuestionCategory, QuestionDifficulty};
use lexlead_rag::search::{WebResult, WebSearch};
use lexlead_rag::testing::{JudgeCall, MockWebSearch, ScriptedJudge, StaticRetriever};
use lexlead_rag::{
    Advisor, AdvisorConfig, AdvisorError, AnswerOutcome, Document, QuestionEvaluation, Strategy,
    StrategyMode,
};

fn selector_config() -> AdvisorConfig {
    AdvisorConfig {
        strategy: StrategyMode::Selector,
        ..Default::default()
    }
}

fn evaluation(is_rag_useful: bool, is_illinois_law: bool, difficulty: QuestionDifficulty) -> QuestionEvaluation {
    QuestionEvaluation {
        category: QuestionCategory::RuleApplication,
        is_rag_useful,
        difficulty,
        reasoning: "Requires applying the statute to the facts.".into(),
        is_illinois_law,
    }
}

#[tokio::test]
async fn selector_sends_illinois_questions_through_workflow() {
    let judge = Arc::new(
        ScriptedJudge::new().with_evaluation(evaluation(true, true, QuestionDifficulty::Hard)),
    );
    let retriever = Arc::new(StaticRetriever::new(vec![
        Document::new("765 ILCS 710/1: deposits returned within 30 days.").with_title("Security Deposit Return Act"),
    ]));
    let advisor = Advisor::new(judge.clone(), retriever.clone(), None, &selector_config());

    let response = advisor.answer("Can my landlord keep my deposit?").await.unwrap();

    assert_eq!(response.strategy, Strategy::Rag);
    assert!(response.result.outcome.is_verified());
    assert_eq!(
        response.evaluation.map(|e| e.category),
        Some(QuestionCategory::RuleApplication)
    );
    assert_eq!(retriever.queries().len(), 1);
    assert_eq!(judge.calls()[0].kind(), "evaluate_question");
}

#[tokio::test]
async fn selector_web_pass_returns_cited_direct_answer() {
    let judge = Arc::new(
        ScriptedJudge::new().with_evaluation(evaluation(false, false, QuestionDifficulty::Medium)),
    );
    let search = Arc::new(MockWebSearch::new().with_results(vec![
        WebResult {
            title: "Federal minimum wage".into(),
            url: "https://www.dol.gov/minimum-wage".into(),
            snippet: "$7.25 per hour".into(),
        },
        WebResult {
            title: "FLSA overview".into(),
            url: "https://www.dol.gov/flsa".into(),
            snippet: "Covers non-exempt employees".into(),
        },
    ]));
    let retriever = Arc::new(StaticRetriever::new(vec![]));
    let advisor = Advisor::new(judge.clone(), retriever.clone(), Some(search.clone() as Arc<dyn WebSearch>), &selector_config());

    let response = advisor.answer("federal minimum wage").await.unwrap();

    assert_eq!(response.strategy, Strategy::WebSearch);
    assert_eq!(
        response.result.outcome,
        AnswerOutcome::Direct {
            answer: "Web answer: federal minimum wage".into()
        }
    );
    let sources: Vec<_> = response
        .result
        .documents
        .iter()
        .filter_map(|d| d.source.clone())
        .collect();
    assert_eq!(sources, vec!["https://www.dol.gov/minimum-wage", "https://www.dol.gov/flsa"]);
    assert!(retriever.queries().is_empty());
    assert_eq!(judge.count_calls(|c| c.kind().starts_with("grade_")), 0);
    assert!(judge.calls().contains(&JudgeCall::AnswerFromWeb {
        question: "federal minimum wage".into(),
        results: 2
    }));
}

#[tokio::test]
async fn selector_cancellation_during_evaluation() {
    let judge = Arc::new(
        ScriptedJudge::new().with_delay("evaluate_question", Duration::from_secs(5)),
    );
    let advisor = Advisor::new(judge.clone(), Arc::new(StaticRetriever::new(vec![])), None, &selector_config());
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        trigger.cancel();
    });

    let err = advisor.answer_with_cancel("q", cancel).await.unwrap_err();
    assert!(matches!(err, AdvisorError::Cancelled));
    assert_eq!(judge.count_calls(|c| c.kind() == "answer_directly"), 0);
}
