use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};

use talkhead_core::{
    confirm, estimate, is_affirmative, BudgetCeiling, ConfirmationProvider, ConsolePrompt,
    CostEstimate,
};

fn prompt_answer(input: &str) -> bool {
    let cost = estimate(30.0, 0.056).unwrap();
    let prompt = ConsolePrompt::new(Cursor::new(input.as_bytes().to_vec()), Vec::new());
    confirm(&cost, false, &prompt)
}

#[test]
fn explicit_affirmatives_approve() {
    for answer in ["y\n", "Y\n", "yes\n", "YES\n", "  yes  \n", "y"] {
        assert!(prompt_answer(answer), "{answer:?} should approve");
    }
}

#[test]
fn everything_else_declines() {
    for answer in ["", "\n", "n\n", "no\n", "yep\n", "sure\n", "1\n", "y es\n", "ok\n"] {
        assert!(!prompt_answer(answer), "{answer:?} should decline");
    }
}

#[test]
fn prompt_shows_the_estimate() {
    let cost = estimate(30.0, 0.056).unwrap();
    let prompt = ConsolePrompt::new(Cursor::new(b"n\n".to_vec()), Vec::new());
    assert!(!prompt.confirm(&cost));

    let shown = String::from_utf8(prompt.into_output().unwrap()).unwrap();
    assert!(shown.contains("$1.68"));
    assert!(shown.contains("[y/N]"));
}

struct CountingProvider {
    calls: AtomicUsize,
}

impl ConfirmationProvider for CountingProvider {
    fn confirm(&self, _estimate: &CostEstimate) -> bool {
        self.calls.fetch_add(1, Ordering::SeqCst);
        false
    }
}

#[test]
fn auto_approve_never_consults_the_provider() {
    let cost = estimate(600.0, 0.056).unwrap();
    let provider = CountingProvider {
        calls: AtomicUsize::new(0),
    };
    assert!(confirm(&cost, true, &provider));
    assert_eq!(provider.calls.load(Ordering::SeqCst), 0);

    assert!(!confirm(&cost, false, &provider));
    assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
}

#[test]
fn budget_ceiling_approves_only_within_budget() {
    let cheap = estimate(30.0, 0.056).unwrap();
    let pricey = estimate(300.0, 0.056).unwrap();

    let ceiling = BudgetCeiling::new(5.0);
    assert!(ceiling.confirm(&cheap));
    assert!(!ceiling.confirm(&pricey));

    assert!(!BudgetCeiling::new(f64::NAN).confirm(&cheap));
}

#[test]
fn affirmative_parsing_is_strict() {
    assert!(is_affirmative("yes"));
    assert!(!is_affirmative(""));
    assert!(!is_affirmative("yess"));
}
