use std::collections::HashMap;
use std::time::Duration;

use reqwest::blocking::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use url::Url;

use crate::annotation::domain::annotation::Annotation;
use crate::sync::domain::annotation_store::{
    AnnotationQuery, AnnotationStore, StoreError, Submission, SubmissionReceipt,
};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnnotationsResponse {
    #[serde(default)]
    all_annotations: HashMap<String, Vec<Annotation>>,
}

/// [`AnnotationStore`] backed by the annotation server's JSON API.
pub struct HttpAnnotationStore {
    client: Client,
    host: Url,
}

impl HttpAnnotationStore {
    /// `host` is the server root; endpoints are resolved under `api/`.
    pub fn new(host: &str, timeout: Duration) -> Result<Self, StoreError> {
        let host = normalize_host(host)?;
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| StoreError::Transport {
                url: host.to_string(),
                source: Box::new(e),
            })?;
        Ok(Self { client, host })
    }

    fn endpoint(&self, path: &str) -> Result<Url, StoreError> {
        self.host.join(path).map_err(|e| StoreError::Validation {
            url: format!("{}{path}", self.host),
            reason: e.to_string(),
        })
    }

    fn send_json<T: DeserializeOwned>(
        &self,
        url: &Url,
        request: RequestBuilder,
    ) -> Result<T, StoreError> {
        log::debug!("Store request: {url}");
        let transport = |e: reqwest::Error| StoreError::Transport {
            url: url.to_string(),
            source: Box::new(e),
        };
        let response = request
            .send()
            .map_err(transport)?
            .error_for_status()
            .map_err(transport)?;
        let body = response.text().map_err(transport)?;
        serde_json::from_str(&body).map_err(|e| StoreError::Validation {
            url: url.to_string(),
            reason: e.to_string(),
        })
    }

    fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, StoreError> {
        let request = self
            .client
            .get(url.clone())
            .header(reqwest::header::ACCEPT, "application/json");
        self.send_json(&url, request)
    }
}

impl AnnotationStore for HttpAnnotationStore {
    fn fetch_annotations(
        &self,
        query: &AnnotationQuery,
    ) -> Result<HashMap<String, Vec<Annotation>>, StoreError> {
        let mut url = self.endpoint("api/annotations")?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs
                .append_pair("movieName", &query.movie)
                .append_pair("startS", &query.start.to_string())
                .append_pair("endS", &query.end.to_string());
            for worker in &query.workers {
                pairs.append_pair("workers", worker);
            }
        }
        let response: AnnotationsResponse = self.get_json(url)?;
        Ok(response.all_annotations)
    }

    fn submit(&self, submission: &Submission) -> Result<SubmissionReceipt, StoreError> {
        let url = self.endpoint("api/submission")?;
        let request = self.client.post(url.clone()).json(submission);
        self.send_json(&url, request)
    }

    fn worker_list(&self) -> Result<Vec<String>, StoreError> {
        self.get_json(self.endpoint("api/worker-list")?)
    }

    fn movie_list(&self) -> Result<Vec<String>, StoreError> {
        self.get_json(self.endpoint("api/movie-list")?)
    }

    fn workers_for_movie(&self, movie: &str) -> Result<Vec<String>, StoreError> {
        let mut url = self.endpoint("api/workers-for-movie")?;
        url.query_pairs_mut().append_pair("movie", movie);
        self.get_json(url)
    }
}

/// Parse `host`, making sure it ends in `/` so relative joins keep its path.
fn normalize_host(host: &str) -> Result<Url, StoreError> {
    let with_slash = if host.ends_with('/') {
        host.to_string()
    } else {
        format!("{host}/")
    };
    Url::parse(&with_slash).map_err(|e| StoreError::Validation {
        url: host.to_string(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::time::TimeInMovie;
    use approx::assert_relative_eq;
    use std::io::{BufRead, BufReader, Read, Write};
    use std::net::TcpListener;
    use std::thread::{self, JoinHandle};

    struct Captured {
        request_line: String,
        body: String,
    }

    /// Serve one HTTP request with `status` and `body`, returning what was
    /// received.
    fn serve_once(status: &str, body: &str) -> (String, JoinHandle<Captured>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let host = format!("http://{}/", listener.local_addr().unwrap());
        let status = status.to_string();
        let body = body.to_string();
        let handle = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream.try_clone().unwrap());
            let mut request_line = String::new();
            reader.read_line(&mut request_line).unwrap();

            let mut content_length = 0;
            loop {
                let mut line = String::new();
                reader.read_line(&mut line).unwrap();
                let line = line.trim_end();
                if line.is_empty() {
                    break;
                }
                if let Some((name, value)) = line.split_once(':') {
                    if name.eq_ignore_ascii_case("content-length") {
                        content_length = value.trim().parse().unwrap();
                    }
                }
            }
            let mut received = vec![0; content_length];
            reader.read_exact(&mut received).unwrap();

            let mut stream = stream;
            write!(
                stream,
                "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            )
            .unwrap();
            Captured {
                request_line: request_line.trim_end().to_string(),
                body: String::from_utf8(received).unwrap(),
            }
        });
        (host, handle)
    }

    fn store(host: &str) -> HttpAnnotationStore {
        HttpAnnotationStore::new(host, Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_fetch_annotations_builds_query_and_parses_sequences() {
        let (host, server) = serve_once(
            "200 OK",
            r#"{"allAnnotations":{"worker7":[{"word":"hi","startTime":10.5,"endTime":10.9},{"word":"there"}]}}"#,
        );
        let query = AnnotationQuery {
            movie: "big movie".to_string(),
            start: TimeInMovie::from_secs(6.0),
            end: TimeInMovie::from_secs(14.0),
            workers: vec!["gold".to_string(), "worker7".to_string()],
        };

        let fetched = store(&host).fetch_annotations(&query).unwrap();
        let captured = server.join().unwrap();

        assert_eq!(
            captured.request_line,
            "GET /api/annotations?movieName=big+movie&startS=6&endS=14&workers=gold&workers=worker7 HTTP/1.1"
        );
        let seq = &fetched["worker7"];
        assert_eq!(seq.len(), 2);
        assert_relative_eq!(seq[0].start_time.unwrap().secs(), 10.5);
        assert!(!seq[1].is_placed());
    }

    #[test]
    fn test_submit_posts_json() {
        let (host, server) = serve_once("200 OK", r#"{"response":"ok","stoken":"x1"}"#);
        let submission = Submission {
            segment: "m:0:4".to_string(),
            movie: "m".to_string(),
            start: TimeInMovie::from_secs(0.0),
            end: TimeInMovie::from_secs(4.0),
            worker: "w".to_string(),
            annotations: vec![],
            words: vec!["hi".to_string()],
        };

        let receipt = store(&host).submit(&submission).unwrap();
        let captured = server.join().unwrap();

        assert_eq!(receipt.response, "ok");
        assert_eq!(receipt.token.as_deref(), Some("x1"));
        assert!(captured.request_line.starts_with("POST /api/submission "));
        let sent: serde_json::Value = serde_json::from_str(&captured.body).unwrap();
        assert_eq!(sent["segment"], "m:0:4");
        assert_eq!(sent["words"], serde_json::json!(["hi"]));
    }

    #[test]
    fn test_workers_for_movie_encodes_movie() {
        let (host, server) = serve_once("200 OK", r#"["b","a"]"#);
        let workers = store(&host).workers_for_movie("a&b").unwrap();
        let captured = server.join().unwrap();
        assert_eq!(workers, vec!["b", "a"]);
        assert!(captured
            .request_line
            .starts_with("GET /api/workers-for-movie?movie=a%26b "));
    }

    #[test]
    fn test_server_error_is_transport_failure() {
        let (host, server) = serve_once("500 Internal Server Error", "{}");
        let result = store(&host).movie_list();
        server.join().unwrap();
        assert!(matches!(result, Err(StoreError::Transport { .. })));
    }

    #[test]
    fn test_malformed_body_is_validation_failure() {
        let (host, server) = serve_once("200 OK", "<html>");
        let result = store(&host).worker_list();
        server.join().unwrap();
        assert!(matches!(result, Err(StoreError::Validation { .. })));
    }

    #[test]
    fn test_host_without_trailing_slash_keeps_path() {
        let store = store("http://example.org/annotator");
        assert_eq!(
            store.endpoint("api/movie-list").unwrap().as_str(),
            "http://example.org/annotator/api/movie-list"
        );
    }

    #[test]
    fn test_invalid_host() {
        assert!(matches!(
            HttpAnnotationStore::new("not a url", Duration::from_secs(1)),
            Err(StoreError::Validation { .. })
        ));
    }
}
