//! Plain-text reports for the admin surface. Formatting only; all
//! numbers come in from the caller so this stays trivially testable.

use std::fmt::Write;

use crawler::pacer::HostPacerStats;
use store::{CrawlStats, ExtractedArticle};

use crate::orchestrator::{CleanupReport, CrawlCounters};
use crate::retriever::SearchHit;

pub fn crawl_report(counters: &CrawlCounters) -> String {
    format!(
        "sites processed:    {}\n\
         links discovered:   {}\n\
         links crawled:      {}\n\
         articles extracted: {}\n\
         errors:             {}",
        counters.sites_processed,
        counters.links_discovered,
        counters.links_crawled,
        counters.articles_extracted,
        counters.errors
    )
}

pub fn cleanup_report(report: &CleanupReport) -> String {
    format!(
        "links marked obsolete: {}\n\
         links blocked:         {}\n\
         links purged:          {}\n\
         attempts pruned:       {}",
        report.links_obsoleted, report.links_blocked, report.links_purged, report.attempts_pruned
    )
}

pub fn stats_report(
    rows: &[CrawlStats],
    recent: &[ExtractedArticle],
    hosts: &[HostPacerStats],
) -> String {
    let mut out = String::new();

    if rows.is_empty() {
        out.push_str("no crawl activity in the window\n");
    }
    for row in rows {
        let quality = row
            .avg_quality
            .map(|q| format!("{q:.2}"))
            .unwrap_or_else(|| "-".to_string());
        let _ = writeln!(
            out,
            "{} site={} discovered={} crawled={} failed={} articles={} avg_quality={}",
            row.day,
            row.site_id,
            row.links_discovered,
            row.links_crawled,
            row.links_failed,
            row.articles_extracted,
            quality
        );
    }

    if !recent.is_empty() {
        let _ = writeln!(out, "recent articles:");
        for article in recent {
            let _ = writeln!(
                out,
                "  [{}] {} (quality {:.2}, {})",
                article.domain,
                article.title,
                article.quality_score,
                article.extracted_at.format("%Y-%m-%d %H:%M")
            );
        }
    }

    for host in hosts {
        let _ = writeln!(
            out,
            "host={} last_minute={} delay_ms={} in_flight={} rate_limited={}",
            host.host,
            host.requests_last_minute,
            host.current_delay_ms,
            host.in_flight,
            host.rate_limited
        );
    }

    out.trim_end().to_string()
}

pub fn search_report(hits: &[SearchHit]) -> String {
    if hits.is_empty() {
        return "No matching articles.".to_string();
    }
    let mut out = String::new();
    for (rank, hit) in hits.iter().enumerate() {
        let _ = writeln!(
            out,
            "{:2}. [{:.3}] {} ({})",
            rank + 1,
            hit.similarity,
            hit.title,
            hit.source_site
        );
        let _ = writeln!(
            out,
            "      {} | quality {:.2} | published {}",
            hit.url,
            hit.quality_score,
            hit.published_date
                .map(|d| d.to_rfc3339())
                .unwrap_or_else(|| "unknown".to_string())
        );
    }
    out.trim_end().to_string()
}
