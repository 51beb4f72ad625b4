//! # Document Intake Tests
//!
//! Uploaded bytes and shared links turned into prompt text.

mod common;

use std::time::Duration;

use pitchbot::config::DocumentConfig;
use pitchbot::document::{
    extract_document_text, fetch_remote_document, DocumentKind, UploadedDocument,
};
use pitchbot::pitch_errors::DocumentParseError;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn local_config() -> DocumentConfig {
    DocumentConfig {
        allow_private_hosts: true,
        ..DocumentConfig::default()
    }
}

/// Minimal PDF with one Helvetica text line per page; an empty string gives a blank page
fn build_pdf(pages: &[&str]) -> Vec<u8> {
    let kids: Vec<String> = (0..pages.len())
        .map(|i| format!("{} 0 R", 4 + i * 2))
        .collect();
    let mut objects = vec![
        "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
        format!(
            "<< /Type /Pages /Kids [{}] /Count {} >>",
            kids.join(" "),
            pages.len()
        ),
        "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica /Encoding /WinAnsiEncoding >>"
            .to_string(),
    ];
    for (i, text) in pages.iter().enumerate() {
        let content = if text.is_empty() {
            String::new()
        } else {
            format!("BT /F1 12 Tf 72 720 Td ({text}) Tj ET")
        };
        objects.push(format!(
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] \
             /Resources << /Font << /F1 3 0 R >> >> /Contents {} 0 R >>",
            5 + i * 2
        ));
        objects.push(format!(
            "<< /Length {} >>\nstream\n{content}\nendstream",
            content.len()
        ));
    }

    let mut pdf = b"%PDF-1.4\n".to_vec();
    let mut offsets = Vec::new();
    for (i, body) in objects.iter().enumerate() {
        offsets.push(pdf.len());
        pdf.extend_from_slice(format!("{} 0 obj\n{body}\nendobj\n", i + 1).as_bytes());
    }
    let xref = pdf.len();
    let mut tail = format!("xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1);
    for offset in offsets {
        tail.push_str(&format!("{offset:010} 00000 n \n"));
    }
    tail.push_str(&format!(
        "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{xref}\n%%EOF\n",
        objects.len() + 1
    ));
    pdf.extend_from_slice(tail.as_bytes());
    pdf
}

#[tokio::test]
async fn test_linked_text_document_is_fetched() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/brief.txt"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/plain; charset=utf-8")
                .set_body_string("Mobile app for field technicians.\nOffline sync required."),
        )
        .mount(&server)
        .await;

    let text = fetch_remote_document(&format!("{}/brief.txt", server.uri()), &local_config())
        .await
        .unwrap();
    assert!(text.contains("Offline sync required."));
}

#[tokio::test]
async fn test_private_link_reports_fetch_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let err = fetch_remote_document(&format!("{}/doc", server.uri()), &local_config())
        .await
        .unwrap_err();
    match err {
        DocumentParseError::Fetch(reason) => assert!(reason.contains("403")),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_oversized_link_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("x".repeat(2048)))
        .mount(&server)
        .await;

    let config = DocumentConfig {
        max_file_size: 1024,
        ..local_config()
    };
    let err = fetch_remote_document(&format!("{}/big.md", server.uri()), &config)
        .await
        .unwrap_err();
    assert!(matches!(err, DocumentParseError::TooLarge { limit: 1024, .. }));
}

#[tokio::test]
async fn test_non_http_links_are_refused() {
    let err = fetch_remote_document("file:///etc/passwd", &DocumentConfig::default())
        .await
        .unwrap_err();
    assert!(matches!(err, DocumentParseError::Fetch(_)));
}

#[tokio::test]
async fn test_uploaded_markdown_and_invalid_utf8() {
    let config = DocumentConfig::default();

    let upload = UploadedDocument::new("scope.md", None, b"# Scope\n- Billing".to_vec()).unwrap();
    assert_eq!(upload.kind, DocumentKind::Markdown);
    let text = extract_document_text(upload, &config).await.unwrap();
    assert!(text.contains("Billing"));

    let upload = UploadedDocument::new("notes.txt", None, vec![0xff, 0xfe, 0x00]).unwrap();
    let err = extract_document_text(upload, &config).await.unwrap_err();
    assert!(matches!(err, DocumentParseError::Encoding));
}

#[tokio::test]
async fn test_garbage_pdf_is_a_parse_error() {
    let upload = UploadedDocument::new("brief.pdf", None, b"not really a pdf".to_vec()).unwrap();
    let err = extract_document_text(upload, &DocumentConfig::default())
        .await
        .unwrap_err();
    assert!(matches!(err, DocumentParseError::Pdf(_)));
}

#[tokio::test]
async fn test_pdf_pages_are_joined_in_order() {
    let pdf = build_pdf(&["Discovery workshop", "Launch support"]);
    let upload = UploadedDocument::new("brief.pdf", Some("application/pdf"), pdf).unwrap();
    let text = extract_document_text(upload, &DocumentConfig::default())
        .await
        .unwrap();

    let first = text.find("Discovery").expect("first page text");
    let second = text.find("Launch").expect("second page text");
    let gap = text.find("\n\n").expect("blank line between pages");
    assert!(first < gap && gap < second, "unexpected page layout: {text:?}");
    assert!(text.contains("workshop") && text.contains("support"));
    assert_eq!(text, text.trim());
}

#[tokio::test]
async fn test_pdf_without_text_is_no_text() {
    let upload = UploadedDocument::new("scan.pdf", None, build_pdf(&["", ""])).unwrap();
    let err = extract_document_text(upload, &DocumentConfig::default())
        .await
        .unwrap_err();
    assert!(matches!(err, DocumentParseError::NoText));
}

#[tokio::test]
async fn test_private_links_refused_by_default() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/latest/meta-data"))
        .respond_with(ResponseTemplate::new(200).set_body_string("INTERNAL SECRET"))
        .expect(0)
        .mount(&server)
        .await;

    let err = fetch_remote_document(
        &format!("{}/latest/meta-data", server.uri()),
        &DocumentConfig::default(),
    )
    .await
    .unwrap_err();
    match err {
        DocumentParseError::Fetch(reason) => assert!(!reason.contains("INTERNAL SECRET")),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_linked_document_follows_redirects() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/share/abc"))
        .respond_with(ResponseTemplate::new(302).insert_header("location", "/files/abc.md"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/files/abc.md"))
        .respond_with(ResponseTemplate::new(200).set_body_string("# Scope\n- Payroll export"))
        .mount(&server)
        .await;

    let text = fetch_remote_document(&format!("{}/share/abc", server.uri()), &local_config())
        .await
        .unwrap();
    assert!(text.contains("Payroll export"));
}

#[tokio::test]
async fn test_endless_chunked_link_stops_at_limit() {
    let base = common::endless_chunked_server(
        "text/plain",
        "Requirements\n",
        "padding padding padding padding padding padding padding padding\n",
    )
    .await;
    let config = DocumentConfig {
        max_file_size: 4096,
        ..local_config()
    };

    let err = tokio::time::timeout(
        Duration::from_secs(10),
        fetch_remote_document(&format!("{base}/brief.txt"), &config),
    )
    .await
    .expect("fetch stopped at the size limit")
    .unwrap_err();
    match err {
        DocumentParseError::TooLarge { size, limit } => {
            assert_eq!(limit, 4096);
            assert!(size > 4096 && size < 4096 + 64 * 1024, "read {size} bytes");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn test_unsupported_upload_type() {
    let err = UploadedDocument::new("deck.pptx", Some("application/vnd.ms-powerpoint"), vec![1]).unwrap_err();
    assert!(matches!(err, DocumentParseError::Unsupported(_)));
}
