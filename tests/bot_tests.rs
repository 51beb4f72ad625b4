use std::path::PathBuf;

use chrono::{TimeZone, Utc};
use pitchbot::bot::message_handler::download_bytes;
use pitchbot::bot::ui_builder::{
    failure_message, format_proposal_list, help_message, proposal_link, ready_message,
    stage_label, welcome_message,
};
use pitchbot::localization::init_localization;
use pitchbot::pipeline::PitchStage;
use pitchbot::pitch_errors::{DocumentParseError, PitchError, StorageError};
use pitchbot::proposal_model::{
    Branding, Brief, Currency, DiagramRef, PricingBreakdown, Proposal, ScopeOfWork,
};

#[cfg(test)]
mod tests {
    use super::*;

    fn setup_localization() {
        // Initialize localization if not already done
        let _ = init_localization();
    }

    fn proposal(diagram: DiagramRef) -> Proposal {
        let brief = Brief::new("Acme").with_currency(Currency::Usd);
        Proposal {
            id: "acme-20240501-120000".to_string(),
            brief,
            branding: Branding::default(),
            scope: ScopeOfWork {
                overview: "A CRM".to_string(),
                deliverables: vec!["Web app".to_string()],
                team: Vec::new(),
                pricing: PricingBreakdown::price(Currency::Usd, vec![("Build".to_string(), 10.0)], Vec::new()),
                roadmap: Vec::new(),
                architecture: Vec::new(),
            },
            diagram,
            html: String::new(),
            html_path: PathBuf::from("proposals/acme-20240501-120000/index.html"),
            diagram_path: None,
            created_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
        }
    }

    /// Test the welcome and help texts list the commands
    #[test]
    fn test_welcome_and_help_messages() {
        setup_localization();

        let welcome = welcome_message(Some("en"));
        assert!(welcome.contains("Welcome to the Proposal Bot!"));
        assert!(welcome.contains("/pitch <url> [project name]"));

        let help = help_message(None);
        assert!(help.contains("How it works"));
        assert!(help.contains("PDF, TXT and Markdown"));
        assert!(help.contains("/cancel"));
    }

    #[test]
    fn test_ready_message_links_the_proposal() {
        setup_localization();

        let rendered = proposal(DiagramRef::Rendered {
            path: "/proposal/acme-20240501-120000/architecture.png".to_string(),
        });
        let text = ready_message(&rendered, "https://pitch.example", None);
        assert!(text.starts_with("✅"));
        assert!(text.contains("https://pitch.example/proposal/acme-20240501-120000"));
        assert!(!text.contains("could not be rendered"));

        let degraded = proposal(DiagramRef::Placeholder);
        let text = ready_message(&degraded, "https://pitch.example", None);
        assert!(text.contains("could not be rendered"));
    }

    #[test]
    fn test_proposal_link_joins_cleanly() {
        assert_eq!(
            proposal_link("http://localhost:8080/", "/proposal/x-1"),
            "http://localhost:8080/proposal/x-1"
        );
        assert_eq!(
            proposal_link("https://pitch.example", "/proposal/x-1"),
            "https://pitch.example/proposal/x-1"
        );
    }

    #[test]
    fn test_empty_proposal_list() {
        setup_localization();
        let text = format_proposal_list(&[], "https://pitch.example", None);
        assert_eq!(text, "No proposals yet. Send /pitch to create one.");
    }

    #[test]
    fn test_failure_messages_name_the_halting_stage() {
        setup_localization();

        let err = PitchError::from(DocumentParseError::Empty);
        let text = failure_message(&err, None);
        assert!(text.contains("reading your document"));
        assert!(text.contains("document is empty"));

        let err = PitchError::from(StorageError::IdExhausted("acme-20240501-120000".to_string()));
        let text = failure_message(&err, None);
        assert!(text.contains("saving the proposal"));
    }

    #[test]
    fn test_stage_labels() {
        setup_localization();
        assert_eq!(stage_label(PitchStage::ExtractingBranding, None), "reading the client's website");
        assert_eq!(stage_label(PitchStage::RenderingDiagram, Some("fr")), "rendering the diagram");
    }

    #[tokio::test]
    async fn test_download_errors_do_not_leak_the_file_url() {
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/file/bot123:SECRET/documents/brief.pdf"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let url = format!("{}/file/bot123:SECRET/documents/brief.pdf", server.uri());
        let err = download_bytes(&url).await.unwrap_err();
        let shown = format!("{err:#} {err:?}");
        assert!(shown.contains("500"), "status missing: {shown}");
        assert!(!shown.contains("SECRET"), "token leaked: {shown}");
    }

    #[tokio::test]
    async fn test_download_returns_body() {
        use wiremock::matchers::method;
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"%PDF-1.4".to_vec()))
            .mount(&server)
            .await;

        let bytes = download_bytes(&format!("{}/file/bot1:abc/doc.pdf", server.uri()))
            .await
            .unwrap();
        assert_eq!(bytes, b"%PDF-1.4");
    }
}
