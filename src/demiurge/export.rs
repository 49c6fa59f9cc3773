//! Playbook export: JSON that parses back, Markdown for people

use clap::ValueEnum;
use std::fmt::Write as _;

use crate::demiurge::playbook::Playbook;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ExportFormat {
    Json,
    Markdown,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Json => "json",
            ExportFormat::Markdown => "md",
        }
    }
}

impl Playbook {
    pub fn export(&self, format: ExportFormat) -> serde_json::Result<String> {
        match format {
            ExportFormat::Json => self.to_json(),
            ExportFormat::Markdown => Ok(self.to_markdown()),
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    pub fn to_markdown(&self) -> String {
        let mut md = String::new();
        let _ = writeln!(md, "# EchoAtlas Cultural Playbook: {}", self.location.label());

        md.push_str("\n## Location\n\n");
        let _ = writeln!(md, "- **Country:** {}", title(self.location.country_name()));
        if let Some(state) = self.location.state() {
            let _ = writeln!(md, "- **State / Region:** {}", title(state));
        }
        if let Some(city) = self.location.city() {
            let _ = writeln!(md, "- **City:** {}", title(city));
        }

        md.push_str("\n## Profile\n\n");
        let _ = writeln!(md, "- **Tone:** {}", self.profile.tone);
        let _ = writeln!(md, "- **Gesture:** {}", self.profile.gesture);
        let _ = writeln!(md, "- **Tip:** {}", self.profile.tip);
        let _ = writeln!(md, "- **Example phrase:** {}", self.profile.example_phrase);

        md.push_str("\n## Style Summary\n\n");
        let _ = writeln!(md, "{}", self.style_summary);

        md.push_str("\n## Etiquette Rules\n\n");
        bullets(&mut md, self.etiquette_rules.iter());

        md.push_str("\n## Do\n\n");
        bullets(&mut md, self.dos.iter());

        md.push_str("\n## Don't\n\n");
        bullets(&mut md, self.donts.iter());

        md.push_str("\n## Examples\n\n");
        if self.examples.is_empty() {
            md.push_str("_No examples yet._\n");
        } else {
            for (i, example) in self.examples.iter().enumerate() {
                if i > 0 {
                    md.push('\n');
                }
                let _ = writeln!(md, "**Q:** {}", example.question.trim());
                let _ = writeln!(md, "**A:** {}", example.answer.trim());
            }
        }
        md
    }
}

fn bullets<'a>(md: &mut String, items: impl ExactSizeIterator<Item = &'a String>) {
    if items.len() == 0 {
        md.push_str("- (No items)\n");
        return;
    }
    for item in items {
        let _ = writeln!(md, "- {item}");
    }
}

fn title(part: &str) -> String {
    crate::totems::location::title_case(part)
}
