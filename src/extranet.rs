//! 加盟店エクストラネット（Azure B2C）の共通ログイン
//!
//! Calendário CAR / Portal Boletos / IAF は同じログインとポップアップを持つ

use std::time::Duration;

use tokio::time::sleep;
use tracing::{info, warn};

use crate::browser::BrowserSession;
use crate::config::Credentials;
use crate::error::ScraperError;

pub const LOGIN_URL: &str = concat!(
    "https://login.extranet.grupoboticario.com.br/1e6392bd-5377-48f0-9a8e-467f5b381b18",
    "/oauth2/v2.0/authorize?p=B2C_1A_JIT_SIGNUPORSIGNIN_FEDCORP_APIGEE_PRD",
    "&client_id=b3001e60-a8e0-4da8-82ba-c3a701405f08",
    "&redirect_uri=https%3A%2F%2Fextranet.grupoboticario.com.br%2Fauth%2Fcallback",
    "&response_type=code",
    "&scope=openid%20email%20https%3A%2F%2Fgboticariob2c.onmicrosoft.com%2Fa6cd4fe6-3d71-455a-b99d-f458a07cc0d1%2Fextranet.api%20offline_access",
    "&state=bbdcc905a11749b8a67f3f06ae03abbb",
    "&code_challenge=HS9vo6VqqoEMeY7-4Jya_4RylUsNKRnkaGbsMhjQmWE",
    "&code_challenge_method=S256&response_mode=query"
);

/// ログイン後のリダイレクト先（`login.` サブドメインとは区別する）
const HOME_URL_FRAGMENT: &str = "://extranet.grupoboticario.com.br/";

const INPUT_USER: &str = "#signInName";
const INPUT_PASSWORD: &str = "#password";
const BUTTON_NEXT: &str = "#next";

const POPUP_BUTTONS: [&str; 2] = ["Aceitar todos os cookies", "Agora não"];

/// ログイン画面が出ていればログインする。セッションが有効ならそのまま
pub async fn login(session: &BrowserSession, credentials: &Credentials) -> Result<(), ScraperError> {
    info!("Navigating to extranet login...");
    session.goto(LOGIN_URL).await?;
    session.wait_request_idle().await?;
    sleep(Duration::from_secs(2)).await;

    if !session.exists(INPUT_USER).await {
        info!("Already logged in, proceeding...");
        return Ok(());
    }

    info!("Login page detected, performing login...");
    session.fill(INPUT_USER, &credentials.user).await?;
    sleep(Duration::from_millis(500)).await;
    session.fill(INPUT_PASSWORD, &credentials.password).await?;

    info!("Clicking ENTRAR...");
    session.click(BUTTON_NEXT).await?;

    if let Err(e) = session
        .wait_for_url(HOME_URL_FRAGMENT, Duration::from_secs(30))
        .await
    {
        if session.exists(INPUT_USER).await {
            return Err(ScraperError::Login(
                "ログイン後もログイン画面のままです".to_string(),
            ));
        }
        warn!("Redirect not confirmed: {}", e);
    }

    session.wait_request_idle().await?;
    sleep(Duration::from_secs(3)).await;
    info!("Post-login URL: {}", session.current_url().await);
    Ok(())
}

/// Cookie バナーと通知ポップアップを閉じる（無ければ何もしない）
pub async fn dismiss_popups(session: &BrowserSession) {
    for text in POPUP_BUTTONS {
        if !session.has_text(text).await {
            continue;
        }
        match session.click_text("button, a, span", text).await {
            Ok(()) => {
                info!("Dismissed popup '{}'", text);
                sleep(Duration::from_secs(1)).await;
            }
            Err(e) => warn!("Failed to dismiss popup '{}': {}", text, e),
        }
    }
}
