//! User listing and search contexts for the picker UI.

use crate::config::ImpersonationConfig;
use crate::redirect::{RedirectField, redirect_arg, redirect_field};
use crate::request::RequestContext;
use crate::user::User;
use serde::Serialize;

/// Page-size bookkeeping
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Paginator {
    pub count: usize,
    pub per_page: usize,
    pub num_pages: usize,
}

impl Paginator {
    pub fn new(count: usize, per_page: usize) -> Self {
        let per_page = per_page.max(1);
        // An empty listing still has one (empty) page
        let num_pages = count.div_ceil(per_page).max(1);
        Self {
            count,
            per_page,
            num_pages,
        }
    }

    /// Items of page `number` (1-indexed), or `None` when out of range.
    pub fn page<'a, T>(&self, items: &'a [T], number: i64) -> Option<&'a [T]> {
        if number < 1 || number as usize > self.num_pages {
            return None;
        }
        let start = (number as usize - 1) * self.per_page;
        let end = (start + self.per_page).min(items.len());
        Some(&items[start.min(end)..end])
    }
}

/// Everything a user picker needs to render a page
#[derive(Debug, Clone, Serialize)]
pub struct ListContext {
    /// Total number of matching users.
    pub users: usize,
    pub paginator: Paginator,
    /// Users on the requested page; `None` when the page is out of range.
    pub page: Option<Vec<User>>,
    pub page_number: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    /// e.g. `?next=/foo/bar`, to append to start links.
    pub redirect: String,
    pub redirect_field: Option<RedirectField>,
}

/// Requested page number; anything but an integer means page 1.
pub fn page_number(request: &RequestContext) -> i64 {
    request
        .query_param("page")
        .and_then(|p| p.trim().parse::<i64>().ok())
        .unwrap_or(1)
}

/// Build the listing context over `users`
pub fn list_context(
    config: &ImpersonationConfig,
    request: &RequestContext,
    users: Vec<User>,
) -> ListContext {
    build_context(config, request, users, None)
}

/// Filter `users` by `query` and build the search context
///
/// Every whitespace-separated term must match, case-insensitively, at least
/// one of the configured search fields.
pub fn search_context(
    config: &ImpersonationConfig,
    request: &RequestContext,
    users: Vec<User>,
    query: &str,
) -> ListContext {
    let matches = filter_users(users, query, &config.search_fields);
    build_context(config, request, matches, Some(query.to_string()))
}

pub fn filter_users(users: Vec<User>, query: &str, fields: &[String]) -> Vec<User> {
    let terms: Vec<String> = query.split_whitespace().map(str::to_lowercase).collect();
    users
        .into_iter()
        .filter(|user| {
            terms.iter().all(|term| {
                fields.iter().any(|field| {
                    user.field(field)
                        .is_some_and(|value| value.to_lowercase().contains(term.as_str()))
                })
            })
        })
        .collect()
}

fn build_context(
    config: &ImpersonationConfig,
    request: &RequestContext,
    users: Vec<User>,
    query: Option<String>,
) -> ListContext {
    let paginator = Paginator::new(users.len(), config.paginate_count);
    let page_number = page_number(request);
    let page = paginator.page(&users, page_number).map(<[User]>::to_vec);

    ListContext {
        users: users.len(),
        paginator,
        page,
        page_number,
        query,
        redirect: redirect_arg(config, request),
        redirect_field: redirect_field(config, request),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn users() -> Vec<User> {
        vec![
            User::new("1", "user1")
                .with_name("John", "Smith")
                .with_email("user1@test-email.com"),
            User::new("2", "user2")
                .with_name("John", "Doe")
                .with_email("user2@test-email.com"),
            User::new("3", "user3").with_email("user3@test-email.com"),
            User::new("4", "user4").with_email("user4@test-email.com"),
        ]
    }

    #[test]
    fn test_paginator() {
        let paginator = Paginator::new(4, 2);
        assert_eq!(paginator.num_pages, 2);
        let items = users();
        assert_eq!(paginator.page(&items, 2).unwrap()[0].id, "3");
        assert!(paginator.page(&items, 3).is_none());
        assert!(paginator.page(&items, 0).is_none());
        assert!(paginator.page(&items, -1).is_none());
    }

    #[test]
    fn test_empty_listing_has_one_empty_page() {
        let paginator = Paginator::new(0, 20);
        assert_eq!(paginator.num_pages, 1);
        let empty: Vec<User> = Vec::new();
        assert_eq!(paginator.page(&empty, 1).unwrap().len(), 0);
    }

    #[test]
    fn test_list_context_page_numbers() {
        let config = ImpersonationConfig::default();

        let ctx = list_context(&config, &RequestContext::for_path("/list"), users());
        assert_eq!(ctx.users, 4);
        assert_eq!(ctx.page_number, 1);
        assert_eq!(ctx.page.as_ref().unwrap().len(), 4);

        let ctx = list_context(&config, &RequestContext::for_path("/list?page=10"), users());
        assert_eq!(ctx.page_number, 10);
        assert!(ctx.page.is_none());

        let ctx = list_context(&config, &RequestContext::for_path("/list?page=no"), users());
        assert_eq!(ctx.page_number, 1);
        assert_eq!(ctx.page.unwrap().len(), 4);
    }

    #[test]
    fn test_search_terms() {
        let fields = ImpersonationConfig::default().search_fields;
        assert_eq!(filter_users(users(), "john", &fields).len(), 2);
        assert_eq!(filter_users(users(), "doe", &fields).len(), 1);
        assert_eq!(filter_users(users(), "JOHN smith", &fields).len(), 1);
        assert_eq!(filter_users(users(), "noresultsfound", &fields).len(), 0);
        assert_eq!(filter_users(users(), "test-email", &fields).len(), 4);
        assert_eq!(filter_users(users(), "", &fields).len(), 4);
    }

    #[test]
    fn test_search_context_pagination() {
        let config = ImpersonationConfig::default().paginate_count(2);
        let ctx = search_context(
            &config,
            &RequestContext::for_path("/search?q=test-email"),
            users(),
            "test-email",
        );
        assert_eq!(ctx.users, 4);
        assert_eq!(ctx.paginator.num_pages, 2);
        assert_eq!(ctx.query.as_deref(), Some("test-email"));
    }

    #[test]
    fn test_redirect_in_context() {
        let config = ImpersonationConfig::default().redirect_field_name("next");
        let ctx = list_context(&config, &RequestContext::for_path("/list"), users());
        assert_eq!(ctx.redirect, "");

        let ctx = list_context(&config, &RequestContext::for_path("/list?next=/test/"), users());
        assert_eq!(ctx.redirect, "?next=/test/");
        assert_eq!(ctx.redirect_field.unwrap().value, "/test/");
    }
}
