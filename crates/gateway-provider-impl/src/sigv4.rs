use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

type HmacSha256 = Hmac<Sha256>;

/// Minimal AWS SigV4 signer for the Bedrock `invoke-model` POST request.
/// Only what the gateway needs: a single JSON body, no query string, no
/// chunked signing.
pub struct SigV4Signer<'a> {
    pub access_key_id: &'a str,
    pub secret_access_key: &'a str,
    pub region: &'a str,
    pub service: &'a str,
}

pub struct SignedHeaders {
    pub authorization: String,
    pub x_amz_date: String,
    pub x_amz_content_sha256: String,
}

impl<'a> SigV4Signer<'a> {
    pub fn sign(&self, method: &str, host: &str, path: &str, body: &[u8], now: time::OffsetDateTime) -> SignedHeaders {
        let amz_date = format_amz_date(now);
        let date_stamp = &amz_date[0..8];
        let payload_hash = hex_sha256(body);

        let canonical_headers = format!("host:{host}\nx-amz-content-sha256:{payload_hash}\nx-amz-date:{amz_date}\n");
        let signed_headers = "host;x-amz-content-sha256;x-amz-date";
        let canonical_request = format!(
            "{method}\n{path}\n\n{canonical_headers}\n{signed_headers}\n{payload_hash}"
        );

        let credential_scope = format!("{date_stamp}/{}/{}/aws4_request", self.region, self.service);
        let string_to_sign = format!(
            "AWS4-HMAC-SHA256\n{amz_date}\n{credential_scope}\n{}",
            hex_sha256(canonical_request.as_bytes())
        );

        let signing_key = derive_signing_key(self.secret_access_key, date_stamp, self.region, self.service);
        let signature = hex_hmac(&signing_key, string_to_sign.as_bytes());

        let authorization = format!(
            "AWS4-HMAC-SHA256 Credential={}/{credential_scope}, SignedHeaders={signed_headers}, Signature={signature}",
            self.access_key_id
        );

        SignedHeaders {
            authorization,
            x_amz_date: amz_date,
            x_amz_content_sha256: payload_hash,
        }
    }
}

fn format_amz_date(now: time::OffsetDateTime) -> String {
    format!(
        "{:04}{:02}{:02}T{:02}{:02}{:02}Z",
        now.year(),
        now.month() as u8,
        now.day(),
        now.hour(),
        now.minute(),
        now.second()
    )
}

fn hex_sha256(data: &[u8]) -> String {
    let digest = Sha256::digest(data);
    hex_encode(&digest)
}

fn hmac_bytes(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key).expect("hmac accepts any key length");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

fn hex_hmac(key: &[u8], data: &[u8]) -> String {
    hex_encode(&hmac_bytes(key, data))
}

fn derive_signing_key(secret: &str, date_stamp: &str, region: &str, service: &str) -> Vec<u8> {
    let k_date = hmac_bytes(format!("AWS4{secret}").as_bytes(), date_stamp.as_bytes());
    let k_region = hmac_bytes(&k_date, region.as_bytes());
    let k_service = hmac_bytes(&k_region, service.as_bytes());
    hmac_bytes(&k_service, b"aws4_request")
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_is_deterministic_for_fixed_inputs() {
        let signer = SigV4Signer {
            access_key_id: "AKIDEXAMPLE",
            secret_access_key: "wJalrXUtnFEMI/K7MDENG/bPxRfiCYEXAMPLEKEY",
            region: "us-east-1",
            service: "bedrock",
        };
        let now = time::OffsetDateTime::from_unix_timestamp(1_700_000_000).unwrap();
        let a = signer.sign("POST", "bedrock-runtime.us-east-1.amazonaws.com", "/model/foo/invoke", b"{}", now);
        let b = signer.sign("POST", "bedrock-runtime.us-east-1.amazonaws.com", "/model/foo/invoke", b"{}", now);
        assert_eq!(a.authorization, b.authorization);
    }
}
