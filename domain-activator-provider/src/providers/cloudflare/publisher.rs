//! `DnsRecordPublisher` implementation for Cloudflare

use async_trait::async_trait;
use reqwest::Method;

use crate::error::Result;
use crate::providers::common::{encode_segment, names_match, normalize_domain_name};
use crate::traits::{DnsRecordPublisher, ErrorContext, ProviderErrorMapper};
use crate::types::{DnsRecordType, PublishedRecord, RecordSpec, ZoneInfo};

use super::types::AccountRef;
use super::{
    CloudflareDnsRecord, CloudflarePublisher, CloudflareRecordBody, CloudflareZone,
    CreateZoneBody, PROVIDER_NAME,
};

/// Stand-in body type for requests without one.
type NoBody = ();

impl CloudflarePublisher {
    fn zone_to_info(zone: CloudflareZone) -> ZoneInfo {
        ZoneInfo {
            id: zone.id,
            name: normalize_domain_name(&zone.name),
            name_servers: zone.name_servers,
            status: zone.status,
        }
    }

    fn to_published(&self, record: CloudflareDnsRecord, zone_id: &str) -> Result<PublishedRecord> {
        let record_type = record
            .record_type
            .parse::<DnsRecordType>()
            .map_err(|e| self.parse_error(e))?;
        Ok(PublishedRecord {
            id: record.id,
            zone_id: record.zone_id.unwrap_or_else(|| zone_id.to_string()),
            record_type,
            name: normalize_domain_name(&record.name),
            content: record.content,
            ttl: record.ttl,
            priority: record.priority,
        })
    }

    fn record_body(spec: &RecordSpec) -> CloudflareRecordBody<'_> {
        CloudflareRecordBody {
            record_type: spec.record_type.as_str(),
            name: &spec.name,
            content: &spec.content,
            ttl: spec.ttl,
            priority: spec.priority,
            proxied: spec.proxied,
        }
    }
}

#[async_trait]
impl DnsRecordPublisher for CloudflarePublisher {
    fn id(&self) -> &'static str {
        PROVIDER_NAME
    }

    async fn create_zone(&self, domain: &str, account_id: &str) -> Result<ZoneInfo> {
        let body = CreateZoneBody {
            name: domain,
            account: AccountRef { id: account_id },
            zone_type: "full",
        };
        let zone: CloudflareZone = self
            .request_result(
                Method::POST,
                "/zones",
                Some(&body),
                ErrorContext::domain(domain),
            )
            .await?;
        log::info!("[{PROVIDER_NAME}] Created zone {} for {domain}", zone.id);
        Ok(Self::zone_to_info(zone))
    }

    async fn find_zone(&self, domain: &str) -> Result<Option<ZoneInfo>> {
        let path = format!("/zones?name={}", encode_segment(domain));
        let zones: Vec<CloudflareZone> = self
            .request::<Vec<CloudflareZone>, NoBody>(
                Method::GET,
                &path,
                None,
                ErrorContext::domain(domain),
            )
            .await?
            .result
            .unwrap_or_default();
        Ok(zones
            .into_iter()
            .find(|z| names_match(&z.name, domain))
            .map(Self::zone_to_info))
    }

    async fn delete_zone(&self, zone_id: &str) -> Result<()> {
        let path = format!("/zones/{}", encode_segment(zone_id));
        self.request::<serde_json::Value, NoBody>(
            Method::DELETE,
            &path,
            None,
            ErrorContext::domain(zone_id),
        )
        .await?;
        log::info!("[{PROVIDER_NAME}] Deleted zone {zone_id}");
        Ok(())
    }

    async fn create_record(&self, zone_id: &str, spec: &RecordSpec) -> Result<PublishedRecord> {
        let path = format!("/zones/{}/dns_records", encode_segment(zone_id));
        let record: CloudflareDnsRecord = self
            .request_result(
                Method::POST,
                &path,
                Some(&Self::record_body(spec)),
                ErrorContext::record(&spec.name),
            )
            .await?;
        log::info!(
            "[{PROVIDER_NAME}] Created {} {} record {} ({})",
            spec.purpose,
            spec.record_type,
            spec.name,
            record.id
        );
        self.to_published(record, zone_id)
    }

    async fn find_records(
        &self,
        zone_id: &str,
        name: &str,
        record_type: DnsRecordType,
    ) -> Result<Vec<PublishedRecord>> {
        let path = format!(
            "/zones/{}/dns_records?type={}&name={}",
            encode_segment(zone_id),
            record_type.as_str(),
            encode_segment(name)
        );
        let records: Vec<CloudflareDnsRecord> = self
            .request::<Vec<CloudflareDnsRecord>, NoBody>(
                Method::GET,
                &path,
                None,
                ErrorContext::domain(zone_id),
            )
            .await?
            .result
            .unwrap_or_default();

        records
            .into_iter()
            .filter(|r| names_match(&r.name, name) && r.record_type == record_type.as_str())
            .map(|r| self.to_published(r, zone_id))
            .collect()
    }

    async fn update_record(
        &self,
        zone_id: &str,
        record_id: &str,
        spec: &RecordSpec,
    ) -> Result<PublishedRecord> {
        let path = format!(
            "/zones/{}/dns_records/{}",
            encode_segment(zone_id),
            encode_segment(record_id)
        );
        let record: CloudflareDnsRecord = self
            .request_result(
                Method::PUT,
                &path,
                Some(&Self::record_body(spec)),
                ErrorContext::record_id(record_id),
            )
            .await?;
        log::info!(
            "[{PROVIDER_NAME}] Updated {} record {} ({record_id})",
            spec.purpose,
            spec.name
        );
        self.to_published(record, zone_id)
    }

    async fn delete_record(&self, zone_id: &str, record_id: &str) -> Result<()> {
        let path = format!(
            "/zones/{}/dns_records/{}",
            encode_segment(zone_id),
            encode_segment(record_id)
        );
        self.request::<serde_json::Value, NoBody>(
            Method::DELETE,
            &path,
            None,
            ErrorContext::record_id(record_id),
        )
        .await?;
        log::info!("[{PROVIDER_NAME}] Deleted record {record_id} in zone {zone_id}");
        Ok(())
    }
}
