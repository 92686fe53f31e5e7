//! RD cache CoAP Server CLI
//!
//! Usage:
//!   cargo run --example coap_server -- [--config rdcache.json] [--port 5683] [--snapshot cache.json]
//!

use std::net::{SocketAddr, UdpSocket};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::Parser;
use coap_lite::{
    CoapOption, CoapRequest, ContentFormat as CoapContentFormat, MessageClass, Packet,
    RequestType, ResponseType,
};
use rust_rdcache::coap_types::{
    ContentFormat, LINK_TEMPLATE_OPTION, Method, QueryParam, Request, Response, ResponseCode,
};
use rust_rdcache::{RdCacheConfig, RdCacheHandler};
use tracing::{Level, debug, info, warn};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "rdcache-server")]
#[command(about = "RD cache CoAP Server - mirror endpoint registrations via CoAP")]
struct Args {
    /// Path to a JSON configuration file
    #[arg(short, long)]
    config: Option<String>,

    /// UDP port to listen on
    #[arg(short, long, default_value = "5683")]
    port: u16,

    /// Write the cache tree as JSON to this file on shutdown
    #[arg(short, long)]
    snapshot: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = match &args.config {
        Some(path) => RdCacheConfig::from_file(path)?,
        None => RdCacheConfig::default(),
    };
    let handler = RdCacheHandler::new(config);

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })?;

    let socket = UdpSocket::bind(("0.0.0.0", args.port))?;
    socket.set_read_timeout(Some(std::time::Duration::from_millis(500)))?;

    info!(
        port = args.port,
        resource = %handler.config().resource_name,
        "RD cache listening"
    );
    println!(
        "  coap-client -m post 'coap://127.0.0.1:{}/{}?ep=node1&lt=120' -e '</sensors/temp>;rt=\"temperature\"'",
        args.port,
        handler.config().resource_name
    );

    let mut buf = [0u8; 1500];
    while running.load(Ordering::SeqCst) {
        let (len, src) = match socket.recv_from(&mut buf) {
            Ok(r) => r,
            Err(e)
                if e.kind() == std::io::ErrorKind::WouldBlock
                    || e.kind() == std::io::ErrorKind::TimedOut
                    || e.kind() == std::io::ErrorKind::Interrupted =>
            {
                continue;
            }
            Err(e) => return Err(e.into()),
        };

        let packet = match Packet::from_bytes(&buf[..len]) {
            Ok(packet) => packet,
            Err(e) => {
                debug!(%src, error = ?e, "dropping undecodable datagram");
                continue;
            }
        };
        // Skip empty ACK packets
        if matches!(packet.header.code, MessageClass::Empty) {
            continue;
        }

        let request = CoapRequest::from_packet(packet, src);
        let response = handle_coap_request(&handler, &request);
        info!(
            %src,
            method = format_method(&request.message.header.code),
            path = %request.get_path(),
            code = %format_response(&response.header.code),
            "request served"
        );
        socket.send_to(&response.to_bytes().unwrap_or_default(), src)?;
    }

    info!("shutting down");
    if let Some(path) = &args.snapshot {
        let json = handler.directory().read().snapshot_json()?;
        std::fs::write(path, &json)?;
        info!(path = %path, bytes = json.len(), "cache snapshot saved");
    }

    Ok(())
}

fn handle_coap_request(handler: &RdCacheHandler, coap_request: &CoapRequest<SocketAddr>) -> Packet {
    let packet = &coap_request.message;
    let path = coap_request.get_path();
    let mut segments = path.split('/').filter(|s| !s.is_empty());

    let method = match packet.header.code {
        MessageClass::Request(RequestType::Get) => Method::Get,
        MessageClass::Request(RequestType::Post) => Method::Post,
        MessageClass::Request(RequestType::Put) => Method::Put,
        MessageClass::Request(RequestType::Delete) => Method::Delete,
        _ => return create_empty_response(packet, ResponseType::MethodNotAllowed),
    };

    if path == ".well-known/core" && method == Method::Get {
        return to_coap_response(packet, Response::link_format(handler.resource_link()));
    }

    if segments.next() != Some(handler.config().resource_name.as_str()) {
        return create_empty_response(packet, ResponseType::NotFound);
    }

    let mut request = Request::new(method);
    request.path = segments.map(str::to_string).collect();
    request.payload = packet.payload.clone();
    if let Some(items) = packet.get_option(CoapOption::UriQuery) {
        request.query = items
            .iter()
            .map(|item| QueryParam::parse(&String::from_utf8_lossy(item)))
            .collect();
    }
    if let Some(CoapContentFormat::ApplicationLinkFormat) = packet.get_content_format() {
        request.content_format = Some(ContentFormat::LinkFormat);
    }

    let response = handler.handle(&request);
    if !response.code.is_success() {
        warn!(code = %response.code, reason = %response.text(), "request failed");
    }
    to_coap_response(packet, response)
}

fn to_coap_response(request: &Packet, rd_response: Response) -> Packet {
    let code = match rd_response.code {
        ResponseCode::Created => ResponseType::Created,
        ResponseCode::Changed => ResponseType::Changed,
        ResponseCode::Content => ResponseType::Content,
        ResponseCode::BadRequest => ResponseType::BadRequest,
        ResponseCode::NotFound => ResponseType::NotFound,
        ResponseCode::MethodNotAllowed => ResponseType::MethodNotAllowed,
        ResponseCode::InternalServerError => ResponseType::InternalServerError,
    };
    let mut response = create_empty_response(request, code);

    for segment in &rd_response.location_path {
        response.add_option(CoapOption::LocationPath, segment.as_bytes().to_vec());
    }
    if let Some(template) = &rd_response.link_template {
        response.add_option(
            CoapOption::Unknown(LINK_TEMPLATE_OPTION),
            template.as_bytes().to_vec(),
        );
    }
    if let Some(format) = rd_response.content_format {
        response.set_content_format(content_format_to_coap(format));
    }
    response.payload = rd_response.payload;
    response
}

fn create_empty_response(request: &Packet, code: ResponseType) -> Packet {
    let mut response = Packet::new();
    response.header.message_id = request.header.message_id;
    response.header.code = MessageClass::Response(code);
    response.set_token(request.get_token().to_vec());
    response
}

fn format_method(code: &MessageClass) -> &'static str {
    match code {
        MessageClass::Request(RequestType::Get) => "GET",
        MessageClass::Request(RequestType::Post) => "POST",
        MessageClass::Request(RequestType::Put) => "PUT",
        MessageClass::Request(RequestType::Delete) => "DELETE",
        MessageClass::Empty => "EMPTY",
        _ => "???",
    }
}

fn format_response(code: &MessageClass) -> String {
    match code {
        MessageClass::Response(r) => format!("{:?}", r),
        _ => "???".to_string(),
    }
}

fn content_format_to_coap(format: ContentFormat) -> CoapContentFormat {
    match format {
        ContentFormat::LinkFormat => CoapContentFormat::ApplicationLinkFormat,
        ContentFormat::TextPlain => CoapContentFormat::TextPlain,
    }
}
