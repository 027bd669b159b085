use actix_web::{HttpResponse, web};
use chrono::NaiveDate;
use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::ApiError;
use crate::exchange_rate::{DATE_FORMAT, RateSeries};
use crate::loader::RateSource;
use crate::query::RateQuery;
use crate::store::RateStore;

const INDEX_HTML: &str = include_str!("../static/index.html");

#[derive(Debug, Deserialize)]
pub struct FxRateParams {
    currency: Option<String>,
    date: Option<String>,
    #[serde(rename = "startDate")]
    start_date: Option<String>,
    #[serde(rename = "endDate")]
    end_date: Option<String>,
}

#[derive(Debug, Serialize)]
struct CurrenciesResponse<'a> {
    currencies: &'a [String],
}

#[derive(Debug, Serialize)]
struct RateResponse {
    currency: String,
    date: String,
    rate: f64,
}

#[derive(Debug, Serialize)]
struct RangeResponse {
    currency: String,
    start_date: String,
    end_date: String,
    rates: RateSeries,
}

#[derive(Debug, Serialize)]
struct ReloadResponse {
    currencies: usize,
    dates: usize,
    first_date: Option<String>,
    last_date: Option<String>,
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::QueryConfig::default().error_handler(|err, _req| {
        ApiError::BadRequest(format!("Invalid query string: {err}")).into()
    }))
    .route("/", web::get().to(index))
    .route("/health", web::get().to(health))
    .route("/currencies", web::get().to(currencies))
    .route("/fxrate", web::get().to(fx_rate))
    .route("/reload", web::post().to(reload));
}

async fn index() -> HttpResponse {
    HttpResponse::Ok()
        .content_type("text/html; charset=utf-8")
        .body(INDEX_HTML)
}

async fn health() -> HttpResponse {
    HttpResponse::Ok().json(json!({ "status": "ok" }))
}

async fn currencies(store: web::Data<RateStore>) -> HttpResponse {
    let table = store.snapshot();
    HttpResponse::Ok().json(CurrenciesResponse {
        currencies: table.currencies(),
    })
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

/// `YYYY-MM-DD` only: no surrounding whitespace and no signed years.
fn parse_date(raw: &str) -> Result<NaiveDate, ApiError> {
    let invalid = || ApiError::BadRequest("Invalid date format. Use YYYY-MM-DD.".to_string());
    if !raw.starts_with(|c: char| c.is_ascii_digit()) {
        return Err(invalid());
    }
    NaiveDate::parse_from_str(raw, DATE_FORMAT).map_err(|_| invalid())
}

async fn fx_rate(
    store: web::Data<RateStore>,
    params: web::Query<FxRateParams>,
) -> Result<HttpResponse, ApiError> {
    let params = params.into_inner();

    let currency = non_empty(params.currency)
        .ok_or_else(|| ApiError::BadRequest("Currency is a required parameter".to_string()))?;
    let code = currency.trim().to_uppercase();

    let table = store.snapshot();
    let query = RateQuery::new(&table);

    match (
        non_empty(params.date),
        non_empty(params.start_date),
        non_empty(params.end_date),
    ) {
        (Some(date), None, None) => {
            let day = parse_date(&date)?;
            let rate = query.get_rate(day, &code).map_err(|e| {
                debug!("No {} rate on {}: {:?}", code, day, e.reason);
                ApiError::NotFound(format!("Rate not found for {} on {}", currency, date))
            })?;

            Ok(HttpResponse::Ok().json(RateResponse {
                currency,
                date,
                rate,
            }))
        }
        (None, Some(start_date), Some(end_date)) => {
            let start = parse_date(&start_date)?;
            let end = parse_date(&end_date)?;
            if start > end {
                return Err(ApiError::BadRequest(
                    "startDate cannot be after endDate".to_string(),
                ));
            }

            let rates = query.get_rates_range(start, end, &code).map_err(|e| {
                debug!("No {} rates in {}..{}: {:?}", code, start, end, e.reason);
                ApiError::NotFound(format!(
                    "No rates found for {} in the date range {} to {}",
                    currency, start_date, end_date
                ))
            })?;

            Ok(HttpResponse::Ok().json(RangeResponse {
                currency,
                start_date,
                end_date,
                rates,
            }))
        }
        _ => Err(ApiError::BadRequest(
            "Either date or both startDate and endDate are required".to_string(),
        )),
    }
}

async fn reload(
    store: web::Data<RateStore>,
    source: web::Data<RateSource>,
) -> Result<HttpResponse, ApiError> {
    let table = store.reload(&source).await?;

    Ok(HttpResponse::Ok().json(ReloadResponse {
        currencies: table.currencies().len(),
        dates: table.len(),
        first_date: table.first_date().map(|d| d.format(DATE_FORMAT).to_string()),
        last_date: table.last_date().map(|d| d.format(DATE_FORMAT).to_string()),
    }))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use actix_web::http::StatusCode;
    use actix_web::{App, test};
    use serde_json::Value;

    use super::*;
    use crate::loader::SourceLocation;
    use crate::rate_table::RateTable;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn mock_table() -> RateTable {
        RateTable::new(
            vec!["USD".to_string(), "CZK".to_string()],
            vec![
                (date(2023, 8, 1), vec![Some(1.097), Some(23.951)]),
                (date(2023, 8, 2), vec![Some(1.0985), Some(23.929)]),
                (date(2023, 8, 3), vec![Some(1.0932), Some(24.034)]),
            ],
        )
        .unwrap()
    }

    async fn get(uri: &str) -> (StatusCode, Value) {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(RateStore::new(mock_table())))
                .configure(configure),
        )
        .await;
        let req = test::TestRequest::get().uri(uri).to_request();
        let resp = test::call_service(&app, req).await;
        let status = resp.status();
        let body: Value = test::read_body_json(resp).await;
        (status, body)
    }

    #[actix_web::test]
    async fn test_currencies_in_table_order() {
        let (status, body) = get("/currencies").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "currencies": ["USD", "CZK"] }));
    }

    #[actix_web::test]
    async fn test_single_date() {
        let (status, body) = get("/fxrate?currency=USD&date=2023-08-01").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!({ "currency": "USD", "date": "2023-08-01", "rate": 1.097 })
        );
    }

    #[actix_web::test]
    async fn test_lowercase_currency_is_echoed() {
        let (status, body) = get("/fxrate?currency=usd&date=2023-08-02").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["currency"], "usd");
        assert_eq!(body["rate"], 1.0985);
    }

    #[actix_web::test]
    async fn test_range_keeps_date_order() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(RateStore::new(mock_table())))
                .configure(configure),
        )
        .await;
        let req = test::TestRequest::get()
            .uri("/fxrate?currency=CZK&startDate=2023-08-01&endDate=2023-08-03")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let body = test::read_body(resp).await;
        assert_eq!(
            std::str::from_utf8(&body).unwrap(),
            r#"{"currency":"CZK","start_date":"2023-08-01","end_date":"2023-08-03","rates":{"2023-08-01":23.951,"2023-08-02":23.929,"2023-08-03":24.034}}"#
        );
    }

    #[actix_web::test]
    async fn test_range_over_non_trading_boundaries() {
        let (status, body) = get("/fxrate?currency=USD&startDate=2023-07-29&endDate=2023-08-02").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["rates"], json!({ "2023-08-01": 1.097, "2023-08-02": 1.0985 }));
    }

    #[actix_web::test]
    async fn test_unparsable_date_is_bad_request() {
        for uri in [
            "/fxrate?currency=USD&date=2023-99-99",
            "/fxrate?currency=XYZ&date=2023-99-99",
            "/fxrate?currency=USD&startDate=2023-08-01&endDate=tomorrow",
            "/fxrate?currency=USD&date=%2B2023-08-01",
            "/fxrate?currency=USD&date=%202023-08-01",
            "/fxrate?currency=USD&date=2023-08-01%20",
            "/fxrate?currency=USD&startDate=-2023-08-01&endDate=2023-08-03",
        ] {
            let (status, body) = get(uri).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
            assert!(body["error"].is_string(), "{uri}");
        }
    }

    #[actix_web::test]
    async fn test_start_after_end_is_bad_request() {
        let (status, body) = get("/fxrate?currency=USD&startDate=2023-09-01&endDate=2023-08-01").await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());
    }

    #[actix_web::test]
    async fn test_wrong_parameter_shapes_are_bad_request() {
        for uri in [
            "/fxrate?date=2023-08-01",
            "/fxrate?currency=&date=2023-08-01",
            "/fxrate?currency=USD",
            "/fxrate?currency=USD&startDate=2023-08-01",
            "/fxrate?currency=USD&date=2023-08-01&startDate=2023-08-01&endDate=2023-08-03",
        ] {
            let (status, body) = get(uri).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
            assert!(body["error"].is_string(), "{uri}");
        }
    }

    #[actix_web::test]
    async fn test_malformed_query_string_is_json_bad_request() {
        let (status, body) = get("/fxrate?currency=USD&currency=CZK&date=2023-08-01").await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());
    }

    #[actix_web::test]
    async fn test_not_found() {
        for uri in [
            "/fxrate?currency=GBP&date=2023-08-01",
            "/fxrate?currency=USD&date=2023-08-05",
            "/fxrate?currency=GBP&startDate=2023-08-01&endDate=2023-08-03",
            "/fxrate?currency=USD&startDate=2024-01-01&endDate=2024-02-01",
        ] {
            let (status, body) = get(uri).await;
            assert_eq!(status, StatusCode::NOT_FOUND, "{uri}");
            assert!(body["error"].is_string(), "{uri}");
        }
    }

    #[actix_web::test]
    async fn test_index_is_served() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(RateStore::new(mock_table())))
                .configure(configure),
        )
        .await;
        let resp = test::call_service(&app, test::TestRequest::get().uri("/").to_request()).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let body = test::read_body(resp).await;
        let page = std::str::from_utf8(&body).unwrap();
        assert!(page.contains("FX Rate Finder"));
        assert!(page.contains(r#"id="downloadCSV""#));
        assert!(page.contains("function downloadCSV"));
    }

    #[actix_web::test]
    async fn test_non_finite_rates_are_never_null() {
        let table = RateTable::new(
            vec!["USD".to_string()],
            vec![
                (date(2023, 8, 1), vec![Some(f64::INFINITY)]),
                (date(2023, 8, 2), vec![Some(f64::NAN)]),
                (date(2023, 8, 3), vec![Some(1.0932)]),
            ],
        )
        .unwrap();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(RateStore::new(table)))
                .configure(configure),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/fxrate?currency=USD&date=2023-08-01")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let req = test::TestRequest::get()
            .uri("/fxrate?currency=USD&startDate=2023-08-01&endDate=2023-08-03")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body = test::read_body(resp).await;
        let text = std::str::from_utf8(&body).unwrap();
        assert!(!text.contains("null"), "{text}");
        assert!(text.ends_with(r#""rates":{"2023-08-03":1.0932}}"#), "{text}");
    }

    #[actix_web::test]
    async fn test_failed_reload_is_bad_gateway() {
        let source = RateSource::new(
            SourceLocation::File(std::env::temp_dir().join("fxrate-routes-missing.zip")),
            Duration::from_secs(5),
        )
        .unwrap();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(RateStore::new(mock_table())))
                .app_data(web::Data::new(source))
                .configure(configure),
        )
        .await;

        let resp = test::call_service(&app, test::TestRequest::post().uri("/reload").to_request()).await;
        assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);

        let resp = test::call_service(
            &app,
            test::TestRequest::get().uri("/fxrate?currency=USD&date=2023-08-01").to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
    }
}
