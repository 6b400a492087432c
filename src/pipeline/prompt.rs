//! Prompt assembly for both pipeline stages.
//!
//! Sections always appear in the same order: schema, examples, instructions,
//! history, question, reasoning plan, closing directive. Empty sections are
//! left out.

use crate::pipeline::models::{ExamplePair, HistoryTurn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Directive {
    GenerateSql,
    ClassifyIntent,
}

impl Directive {
    fn text(&self) -> &'static str {
        match self {
            Directive::GenerateSql => "Think step by step and generate the SQL query:",
            Directive::ClassifyIntent => {
                "Analyze the user's intent and return the classification as JSON:"
            }
        }
    }
}

pub struct PromptBuilder<'a> {
    question: &'a str,
    directive: Directive,
    schemas: &'a [String],
    examples: &'a [ExamplePair],
    instructions: &'a [String],
    histories: &'a [HistoryTurn],
    reasoning: Option<&'a str>,
}

impl<'a> PromptBuilder<'a> {
    pub fn new(question: &'a str, directive: Directive) -> Self {
        Self {
            question,
            directive,
            schemas: &[],
            examples: &[],
            instructions: &[],
            histories: &[],
            reasoning: None,
        }
    }

    pub fn schemas(mut self, schemas: &'a [String]) -> Self {
        self.schemas = schemas;
        self
    }

    pub fn examples(mut self, examples: &'a [ExamplePair]) -> Self {
        self.examples = examples;
        self
    }

    pub fn instructions(mut self, instructions: &'a [String]) -> Self {
        self.instructions = instructions;
        self
    }

    pub fn histories(mut self, histories: &'a [HistoryTurn]) -> Self {
        self.histories = histories;
        self
    }

    pub fn reasoning(mut self, reasoning: Option<&'a str>) -> Self {
        self.reasoning = reasoning;
        self
    }

    pub fn build(&self) -> String {
        let mut parts: Vec<String> = Vec::new();

        if !self.schemas.is_empty() {
            parts.push("### DATABASE SCHEMA ###".to_string());
            parts.extend(self.schemas.iter().cloned());
            parts.push(String::new());
        }

        if !self.examples.is_empty() {
            parts.push("### SQL EXAMPLES ###".to_string());
            push_pairs(&mut parts, self.examples);
        }

        if !self.instructions.is_empty() {
            parts.push("### USER INSTRUCTIONS ###".to_string());
            for (i, instruction) in self.instructions.iter().enumerate() {
                parts.push(format!("{}. {}", i + 1, instruction));
            }
            parts.push(String::new());
        }

        if !self.histories.is_empty() {
            parts.push("### CONVERSATION HISTORY ###".to_string());
            push_pairs(&mut parts, self.histories);
        }

        parts.push("### QUESTION ###".to_string());
        parts.push(format!("User question: {}", self.question));
        parts.push(String::new());

        if let Some(reasoning) = self.reasoning.filter(|r| !r.trim().is_empty()) {
            parts.push("### REASONING PLAN ###".to_string());
            parts.push(reasoning.to_string());
            parts.push(String::new());
        }

        parts.push(self.directive.text().to_string());

        parts.join("\n")
    }
}

fn push_pairs(parts: &mut Vec<String>, pairs: &[ExamplePair]) {
    for pair in pairs {
        parts.push(format!("Question: {}", pair.question));
        parts.push(format!("SQL: {}", pair.sql));
        parts.push(String::new());
    }
}
