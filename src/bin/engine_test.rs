use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use codestreak::daily::DailyQuestionService;
use codestreak::progress::ProgressService;
use codestreak::question::Question;
use codestreak::store::{MemoryStore, QuestionStore};
use std::sync::Arc;
use std::thread;

// Helper to build a store pre-loaded with questions q0..qN
fn seeded_store(count: usize) -> Arc<MemoryStore> {
    let store = MemoryStore::new();
    for i in 0..count {
        let mut question = Question::new(format!("Question {i}"), format!("Description {i}"));
        question.id = format!("q{i}");
        question.difficulty = Some(
            match i % 3 {
                0 => "Easy",
                1 => "Medium",
                _ => "Hard",
            }
            .to_string(),
        );
        QuestionStore::upsert(store.as_ref(), &question).expect("seeding should not fail");
    }
    store
}

fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
}

// Test that one date always resolves to one pinned question
fn test_daily_question_idempotent() {
    println!("\n====== Testing daily question idempotence ======");
    let store = seeded_store(30);
    let service = DailyQuestionService::new(store.clone(), store);
    let today = day(2026, 8, 7);

    let first = service.daily_question(today).unwrap().unwrap();
    for _ in 0..25 {
        let again = service.daily_question(today).unwrap().unwrap();
        assert_eq!(again.id, first.id);
    }
    println!("✓ 26 calls on the same date all returned question {}", first.id);

    let tomorrow = service.daily_question(day(2026, 8, 8)).unwrap().unwrap();
    println!("✓ Next date got its own assignment ({})", tomorrow.id);
}

fn test_daily_question_empty_store() {
    println!("\n====== Testing daily question with empty store ======");
    let store = MemoryStore::new();
    let service = DailyQuestionService::new(store.clone(), store);

    let result = service.daily_question(day(2026, 8, 7)).unwrap();
    assert!(result.is_none());
    println!("✓ Empty question store yields no question rather than an error");
}

fn test_daily_question_race() {
    println!("\n====== Testing racing daily question requests ======");
    let store = seeded_store(50);
    let today = day(2026, 8, 7);

    let mut handles = Vec::new();
    for _ in 0..8 {
        let store = store.clone();
        handles.push(thread::spawn(move || {
            let service = DailyQuestionService::new(store.clone(), store);
            service.daily_question(today).unwrap().unwrap().id
        }));
    }

    let ids: Vec<String> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert!(ids.windows(2).all(|pair| pair[0] == pair[1]));
    println!("✓ 8 racing threads all observed the same winner ({})", ids[0]);
}

// Test the documented streak walk: day 1 -> 1, day 2 -> 2, skip, day 4 -> 1
fn test_streak_walk() {
    println!("\n====== Testing streak transitions ======");
    let store = MemoryStore::new();
    let service = ProgressService::new(store);

    let first = service
        .record_completion("student", "q1", "Easy", at(2026, 8, 1, 9))
        .unwrap();
    assert_eq!(first.current_streak, 1);
    println!("✓ First completion starts the streak at 1");

    let second = service
        .record_completion("student", "q2", "Medium", at(2026, 8, 2, 9))
        .unwrap();
    assert_eq!(second.current_streak, 2);
    println!("✓ Consecutive day extends the streak to 2");

    let after_gap = service
        .record_completion("student", "q3", "Hard", at(2026, 8, 4, 9))
        .unwrap();
    assert_eq!(after_gap.current_streak, 1);
    println!("✓ A skipped day resets the streak to 1");
}

fn test_same_day_resubmission() {
    println!("\n====== Testing same-day resubmission ======");
    let store = MemoryStore::new();
    let service = ProgressService::new(store);

    service
        .record_completion("student", "q1", "Easy", at(2026, 8, 1, 9))
        .unwrap();
    let again = service
        .record_completion("student", "q1", "Easy", at(2026, 8, 1, 18))
        .unwrap();

    assert!(again.already_completed);
    assert_eq!(again.current_streak, 1);

    let view = service.progress("student").unwrap();
    assert_eq!(view.total_solved, 1);
    println!("✓ Resubmitting the same question on the same day is a no-op");

    let other = service
        .record_completion("student", "q2", "Medium", at(2026, 8, 1, 20))
        .unwrap();
    assert!(!other.already_completed);
    assert_eq!(other.current_streak, 1);
    assert_eq!(service.progress("student").unwrap().total_solved, 2);
    println!("✓ A different question on the same day counts without touching the streak");
}

fn test_stats_tally() {
    println!("\n====== Testing difficulty stats ======");
    let store = MemoryStore::new();
    let service = ProgressService::new(store);

    let labels = ["Easy", "easy", "MEDIUM", "Hard", "code of choice", "unknown"];
    for (i, label) in labels.iter().enumerate() {
        service
            .record_completion("student", &format!("q{i}"), label, at(2026, 8, 1, 9))
            .unwrap();
    }

    let view = service.progress("student").unwrap();
    assert_eq!(view.stats.easy, 2);
    assert_eq!(view.stats.medium, 1);
    assert_eq!(view.stats.hard, 1);
    assert_eq!(view.stats.choice, 2);
    assert_eq!(view.stats.total(), view.total_solved);
    println!("✓ Buckets tally case-insensitively and sum to totalSolved");
}

fn test_invalid_arguments() {
    println!("\n====== Testing argument validation ======");
    let store = MemoryStore::new();
    let service = ProgressService::new(store);

    assert!(service
        .record_completion("", "q1", "Easy", at(2026, 8, 1, 9))
        .is_err());
    assert!(service
        .record_completion("student", "", "Easy", at(2026, 8, 1, 9))
        .is_err());
    assert!(service
        .record_completion("student", "q1", "  ", at(2026, 8, 1, 9))
        .is_err());
    println!("✓ Empty userId, questionId and difficulty are all rejected");
}

fn main() {
    println!("Running daily assignment & progress engine tests...");

    test_daily_question_idempotent();
    test_daily_question_empty_store();
    test_daily_question_race();
    test_streak_walk();
    test_same_day_resubmission();
    test_stats_tally();
    test_invalid_arguments();

    println!("\nAll engine tests passed!");
}
