use crate::api::ApiClient;
use crate::dom::{escape_attr, escape_html, Page};
use crate::model::{looks_like_company_id, resolve_image_src, CompanyRecord, StudentRecord};

/// Fill the modal header slots from a student record. Idempotent over its
/// input; the company lookup result is cached on the slot dataset so one
/// modal session fetches it at most once.
pub fn render(page: &mut Page, api: &dyn ApiClient, warnings: &mut Vec<String>, student: &StudentRecord) {
    let contract = page.contract().clone();

    page.set_text(&contract.student_name, &student.display_name());
    page.set_text(&contract.student_id, &student.id);

    let status = student.status_label();
    let color = if status.eq_ignore_ascii_case("active") {
        "success"
    } else {
        "danger"
    };
    page.set_html(
        &contract.student_status,
        format!(
            "<span class=\"badge bg-{c}-subtle text-{c}\">{}</span>",
            escape_html(&status),
            c = color
        ),
    );

    let src = resolve_image_src(student.image.as_deref(), &contract.image_base_path);
    page.set_attr(&contract.student_image, "src", &src);
    page.set_attr(&contract.student_image, "alt", &student.display_name());

    render_company(page, api, warnings, student);
}

fn render_company(page: &mut Page, api: &dyn ApiClient, warnings: &mut Vec<String>, student: &StudentRecord) {
    let contract = page.contract().clone();
    let slot = contract.student_company.clone();

    // Embedded company record needs no lookup.
    if let Some(embedded) = student.company.as_ref().filter(|c| c.is_object()) {
        let company = CompanyRecord::from_value(embedded);
        if company.name.is_some() {
            let html = company_html(&company, &contract.company_page_base);
            page.set_html(&slot, html);
            if let Some(id) = &company.id {
                page.set_data(&slot, "companyId", id);
            }
            return;
        }
    }

    let candidate = student
        .company_id
        .clone()
        .or_else(|| {
            student
                .company
                .as_ref()
                .and_then(|c| c.as_str())
                .filter(|s| looks_like_company_id(s))
                .map(str::to_string)
        });

    let Some(company_id) = candidate else {
        // A long company string is a display name, not an identifier.
        if let Some(name) = student.company.as_ref().and_then(|c| c.as_str()) {
            if !name.trim().is_empty() {
                page.set_text(&slot, name.trim());
                return;
            }
        }
        page.set_html(&slot, "<span class=\"text-muted\">Not Assigned</span>");
        return;
    };

    // Resolved once per modal open; the dataset carries the cache.
    if page.data(&slot, "companyId") == Some(company_id.as_str()) {
        return;
    }

    match api.fetch_company(&company_id) {
        Ok(body) => {
            let company = CompanyRecord::from_value(&body);
            let html = company_html(&company, &contract.company_page_base);
            page.set_html(&slot, html);
            page.set_data(&slot, "companyId", &company_id);
        }
        Err(e) if e.is_not_found() => {
            page.set_html(
                &slot,
                format!(
                    "Unknown Company <span class=\"badge bg-secondary-subtle text-secondary\">{}</span>",
                    escape_html(&company_id)
                ),
            );
            page.set_data(&slot, "companyId", &company_id);
        }
        Err(e) => {
            warnings.push(format!("company lookup failed: {}", e));
            let fallback = student
                .company
                .as_ref()
                .and_then(|c| CompanyRecord::from_value(c).name)
                .unwrap_or_default();
            if fallback.is_empty() {
                page.set_html(&slot, "<span class=\"text-muted\">Not Assigned</span>");
            } else {
                page.set_text(&slot, &fallback);
            }
        }
    }
}

fn company_html(company: &CompanyRecord, company_page_base: &str) -> String {
    let name = company.name.clone().unwrap_or_else(|| "Unknown Company".to_string());
    let mut html = match &company.id {
        Some(id) => format!(
            "<a href=\"{}{}\">{}</a>",
            escape_attr(company_page_base),
            escape_attr(id),
            escape_html(&name)
        ),
        None => escape_html(&name),
    };
    if let Some(industry) = &company.industry {
        html.push_str(&format!(
            " <span class=\"badge bg-info-subtle text-info\">{}</span>",
            escape_html(industry)
        ));
    }
    html
}
