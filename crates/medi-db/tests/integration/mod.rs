mod common;
mod flashcard_tests;
mod quiz_tests;
mod user_tests;
