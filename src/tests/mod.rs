mod common;
mod tag_tests;
mod choice_tests;
