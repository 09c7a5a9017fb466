//! Static site content the `/ask` assistant answers from, and the team
//! directory behind `/search`.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SiteDoc {
    pub id: &'static str,
    pub title: &'static str,
    pub url: &'static str,
    pub tags: &'static [&'static str],
    pub content: &'static str,
}

pub static SITE_DOCS: &[SiteDoc] = &[
    SiteDoc {
        id: "team",
        title: "Team",
        url: "/Teams",
        tags: &["team", "founder", "jay", "about", "who built"],
        content: "PromptX Team (current status):
- PromptX is currently built by a single contributor.
- Name: Jay Patel
- Role: Founder of PromptX
- Education: B.Tech (completed)
- Location: Surat, Gujarat, India
- Contribution: Jay is currently the only person contributing to the project.",
    },
    SiteDoc {
        id: "pricing",
        title: "Pricing",
        url: "/Pricing",
        tags: &["pricing", "plans", "cost", "price"],
        content: "Pricing page status:
- The Pricing page is currently under construction and shows a placeholder message.
- Pricing details are not published yet.",
    },
    SiteDoc {
        id: "site-status",
        title: "Site status",
        url: "/",
        tags: &["status", "under construction", "work in progress"],
        content: "PromptX site status:
- Some pages may still be placeholders or not fully built yet.
- If a user asks something that isn't in the site content yet, say it's not available yet.",
    },
];

/// Suggested questions returned with every `/ask` answer.
pub const FOLLOWUPS: [&str; 3] = [
    "Who built PromptX?",
    "Is pricing available yet?",
    "What pages are under construction?",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TeamMember {
    pub id: &'static str,
    pub name: &'static str,
    pub role: &'static str,
    pub bio: &'static str,
}

pub static TEAM: &[TeamMember] = &[
    TeamMember { id: "jay", name: "Jay Patel", role: "Founder", bio: "Works on PromptX" },
    TeamMember { id: "dev1", name: "Dev One", role: "Frontend", bio: "Next.js + UI" },
];
