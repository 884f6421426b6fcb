//! Command routing tests

use chrono::{DateTime, Local, TimeZone};
use ziggy_voice::commands::{
    AI_QUERY_TYPE, CommandHandler, CommandResult, CommandRouter, DateHandler, RouteKind,
    TimeHandler, contains_question,
};

fn fixed_clock() -> DateTime<Local> {
    Local.with_ymd_and_hms(2024, 3, 9, 15, 7, 0).unwrap()
}

/// Claims anything mentioning weather
struct WeatherHandler;

impl CommandHandler for WeatherHandler {
    fn can_handle(&self, text: &str) -> bool {
        text.to_lowercase().contains("weather")
    }

    fn handle(&self, _text: &str) -> CommandResult {
        CommandResult::ok(self.command_type(), "It is sunny")
    }

    fn command_type(&self) -> &'static str {
        "weather"
    }
}

fn time_and_date_router() -> CommandRouter {
    let mut router = CommandRouter::new();
    router.register(Box::new(TimeHandler::with_clock(fixed_clock)));
    router.register(Box::new(DateHandler::with_clock(fixed_clock)));
    router
}

#[test]
fn test_time_is_answered_locally() {
    let router = time_and_date_router();
    let (kind, result) = router.route("what time is it");

    assert_eq!(kind, RouteKind::Local);
    assert_eq!(kind.to_string(), "local");
    assert_eq!(result.command_type, "time");
    assert_eq!(result.response, "The time is 03:07 PM");
    assert!(result.success);
}

#[test]
fn test_date_is_answered_locally() {
    let router = time_and_date_router();
    let (kind, result) = router.route("What's the date today?");

    assert_eq!(kind, RouteKind::Local);
    assert_eq!(result.command_type, "date");
    assert_eq!(result.response, "Today is Saturday, March 09, 2024");
}

#[test]
fn test_unclaimed_text_goes_to_ai() {
    let router = time_and_date_router();
    let (kind, result) = router.route("tell me a joke");

    assert_eq!(kind, RouteKind::Ai);
    assert_eq!(kind.to_string(), "ai");
    assert_eq!(result.command_type, AI_QUERY_TYPE);
    assert!(result.response.is_empty());
}

#[test]
fn test_first_registered_handler_wins() {
    let mut router = CommandRouter::new();
    router.register(Box::new(WeatherHandler));
    router.register(Box::new(TimeHandler::with_clock(fixed_clock)));
    assert_eq!(router.len(), 2);

    let (_, result) = router.route("what time will the weather change");
    assert_eq!(result.command_type, "weather");
}

#[test]
fn test_default_handlers_cover_math_and_conversion() {
    let router = CommandRouter::with_default_handlers();

    let (kind, result) = router.route("what is 6 times 7");
    assert_eq!(kind, RouteKind::Local);
    assert_eq!(result.command_type, "math");
    assert!(result.success);

    let (kind, result) = router.route("convert 100 fahrenheit to celsius");
    assert_eq!(kind, RouteKind::Local);
    assert_eq!(result.command_type, "conversion");
    assert!(result.success);
}

#[test]
fn test_failed_handler_still_answers_locally() {
    let router = CommandRouter::with_default_handlers();
    let (kind, result) = router.route("what is 5 divided by 0");

    assert_eq!(kind, RouteKind::Local);
    assert_eq!(result.command_type, "math");
    assert!(!result.success);
}

#[test]
fn test_question_detection() {
    assert!(contains_question("What is your name?"));
    assert!(contains_question("How are you"));
    assert!(contains_question("Can you help me"));
    assert!(!contains_question("Tell me about yourself."));
    assert!(!contains_question(""));
}
