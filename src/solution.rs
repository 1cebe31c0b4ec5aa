//! Step-by-step solution documents.
//!
//! A solution arrives from an external solver as JSON, usually wrapped in
//! markdown fences or surrounded by chatter. Every string inside it is
//! untrusted render input: [`build_solution_view`] places each one on its own
//! element as pending math content, so it goes through classification and
//! normalization like anything else.
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};

use crate::common::{Error, Result};
use crate::dom::{DISPLAY_ATTR, Element};

/// What the problem gives and what it asks for.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProblemSummary {
    pub givens: Vec<String>,
    pub target: String,
}

/// A plausible but wrong choice offered at a step.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WrongOption {
    pub notation: String,
    pub explanation: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Step {
    pub description: String,
    /// Notation of the correct move at this step
    pub solution_notation: String,
    pub hint: String,
    pub wrong_options: Vec<WrongOption>,
}

/// Structured solution of one problem.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SolutionDocument {
    pub problem_summary: ProblemSummary,
    pub steps: Vec<Step>,
    pub full_solution_notation: Vec<String>,
}

impl SolutionDocument {
    /// Parse a solver reply, tolerating code fences and prose around the
    /// JSON object.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use mathrender::solution::SolutionDocument;
    ///
    /// let reply = "Here you go:\n```json\n{\"steps\": [{\"description\": \"Add\"}]}\n```";
    /// let doc = SolutionDocument::from_json_lenient(reply).unwrap();
    /// assert_eq!(doc.steps[0].description, "Add");
    /// ```
    pub fn from_json_lenient(raw: &str) -> Result<Self> {
        let body = strip_fences(raw);
        let start = body
            .find('{')
            .ok_or_else(|| Error::InvalidSolution("no JSON object in reply".to_string()))?;
        let end = body
            .rfind('}')
            .filter(|&end| end > start)
            .ok_or_else(|| Error::InvalidSolution("unterminated JSON object".to_string()))?;
        serde_json::from_str(&body[start..=end]).map_err(|e| Error::InvalidSolution(e.to_string()))
    }

    /// Whether there is nothing to show.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
            && self.full_solution_notation.is_empty()
            && self.problem_summary.target.trim().is_empty()
            && self.problem_summary.givens.is_empty()
    }

    /// Number of strings a view of this document can show, blank ones included.
    pub fn notation_count(&self) -> usize {
        let summary = self.problem_summary.givens.len() + 1;
        let steps: usize = self.steps.iter().map(|step| 3 + 2 * step.wrong_options.len()).sum();
        summary + steps + self.full_solution_notation.len()
    }
}

/// Body between the first pair of markdown fences, or the whole reply.
fn strip_fences(raw: &str) -> &str {
    let Some(open) = raw.find("```") else {
        return raw.trim();
    };
    let after = &raw[open + 3..];
    // Skip the language tag on the fence line.
    let body = match after.find('\n') {
        Some(newline) => &after[newline + 1..],
        None => after,
    };
    match body.find("```") {
        Some(close) => body[..close].trim(),
        None => body.trim(),
    }
}

/// The external solver.
pub trait SolutionSource: Send + Sync {
    /// Solve `problem`, optionally with an image of it. `Ok(None)` means the
    /// solver had no answer.
    fn get_solution<'a>(
        &'a self,
        problem: &'a str,
        image: Option<&'a [u8]>,
    ) -> BoxFuture<'a, Result<Option<SolutionDocument>>>;
}

fn notation(tag: &str, class: &str, content: &str) -> Option<Element> {
    (!content.trim().is_empty()).then(|| Element::new(tag).with_class(class).with_math(content))
}

fn append_all<I: IntoIterator<Item = Element>>(parent: &Element, children: I) {
    for child in children {
        parent.append_child(child);
    }
}

/// Build the element tree showing `doc`. Blank strings get no element.
///
/// Nothing is rendered yet; every leaf carries its string as pending math
/// content.
pub fn build_solution_view(doc: &SolutionDocument) -> Element {
    let view = Element::new("div").with_class("solution");

    let summary = Element::new("section").with_class("problem-summary");
    append_all(
        &summary,
        doc.problem_summary
            .givens
            .iter()
            .filter_map(|given| notation("div", "given", given)),
    );
    append_all(&summary, notation("div", "target", &doc.problem_summary.target));
    view.append_child(summary);

    for (index, step) in doc.steps.iter().enumerate() {
        let section = Element::new("section")
            .with_class("step")
            .with_attr("data-step", (index + 1).to_string());
        append_all(&section, notation("p", "step-description", &step.description));
        append_all(
            &section,
            notation("div", "step-notation", &step.solution_notation).map(|e| e.with_attr(DISPLAY_ATTR, "true")),
        );
        append_all(&section, notation("div", "step-hint", &step.hint));

        if !step.wrong_options.is_empty() {
            let options = Element::new("ul").with_class("wrong-options");
            for option in &step.wrong_options {
                let item = Element::new("li").with_class("wrong-option");
                append_all(&item, notation("span", "option-notation", &option.notation));
                append_all(&item, notation("span", "option-explanation", &option.explanation));
                options.append_child(item);
            }
            section.append_child(options);
        }
        view.append_child(section);
    }

    if !doc.full_solution_notation.is_empty() {
        let full = Element::new("section").with_class("full-solution");
        append_all(
            &full,
            doc.full_solution_notation
                .iter()
                .filter_map(|line| notation("div", "solution-line", line).map(|e| e.with_attr(DISPLAY_ATTR, "true"))),
        );
        view.append_child(full);
    }

    view
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::MATH_SOURCE_ATTR;

    const REPLY: &str = r#"Sure! Here is the solution:
```json
{
  "problemSummary": {"givens": ["$a = 3$", "$b = 4$"], "target": "$c$"},
  "steps": [
    {
      "description": "Apply the Pythagorean theorem",
      "solutionNotation": "$$c^2 = a^2 + b^2$$",
      "hint": "Right triangle",
      "wrongOptions": [{"notation": "$c = a + b$", "explanation": "Sides do not add"}]
    }
  ],
  "fullSolutionNotation": ["$c = \\sqrt{9 + 16} = 5$"]
}
```
Let me know if you need more."#;

    #[test]
    fn test_lenient_parse_strips_fences_and_prose() {
        let doc = SolutionDocument::from_json_lenient(REPLY).unwrap();
        assert_eq!(doc.problem_summary.givens, vec!["$a = 3$", "$b = 4$"]);
        assert_eq!(doc.steps.len(), 1);
        assert_eq!(doc.steps[0].wrong_options[0].notation, "$c = a + b$");
        assert_eq!(doc.full_solution_notation[0], r"$c = \sqrt{9 + 16} = 5$");
        assert_eq!(doc.notation_count(), 3 + 5 + 1);
    }

    #[test]
    fn test_bare_json_and_missing_fields() {
        let doc = SolutionDocument::from_json_lenient(r#"{"steps": []}"#).unwrap();
        assert!(doc.is_empty());
    }

    #[test]
    fn test_invalid_replies() {
        for reply in ["no json here", "} backwards {", "{\"steps\": 5}"] {
            let err = SolutionDocument::from_json_lenient(reply).unwrap_err();
            assert_eq!(err.reason_tag(), "invalid-solution", "{reply}");
        }
    }

    #[test]
    fn test_view_has_one_pending_element_per_string() {
        let doc = SolutionDocument::from_json_lenient(REPLY).unwrap();
        let view = build_solution_view(&doc);
        let pending: Vec<_> = view
            .descendants()
            .into_iter()
            .filter(|e| e.has_attr(MATH_SOURCE_ATTR))
            .collect();
        assert_eq!(pending.len(), doc.notation_count());

        let notation = pending.iter().find(|e| e.has_class("step-notation")).unwrap();
        assert_eq!(notation.attr(MATH_SOURCE_ATTR).as_deref(), Some("$$c^2 = a^2 + b^2$$"));
        assert!(notation.has_attr(DISPLAY_ATTR));
    }

    #[test]
    fn test_blank_strings_are_skipped() {
        let doc = SolutionDocument {
            steps: vec![Step {
                description: "Only words".to_string(),
                ..Step::default()
            }],
            ..SolutionDocument::default()
        };
        let view = build_solution_view(&doc);
        let pending = view
            .descendants()
            .into_iter()
            .filter(|e| e.has_attr(MATH_SOURCE_ATTR))
            .count();
        assert_eq!(pending, 1);
    }
}
