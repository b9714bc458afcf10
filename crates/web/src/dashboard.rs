//! Static dashboard page written once at startup.

use std::path::Path;

use anyhow::{Context, Result};
use maud::{DOCTYPE, Markup, PreEscaped, html};

pub const RECONNECT_BASE_MS: u64 = 1_000;
pub const RECONNECT_MAX_MS: u64 = 30_000;
const PING_INTERVAL_MS: u64 = 30_000;

const STYLE: &str = r#"
* { margin: 0; padding: 0; box-sizing: border-box; }
body { font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif; background: #0d1117; color: #f0f6fc; line-height: 1.6; }
.container { max-width: 1400px; margin: 0 auto; padding: 20px; }
header { background: linear-gradient(135deg, #238636 0%, #2ea043 100%); padding: 30px; border-radius: 12px; margin-bottom: 30px; text-align: center; position: relative; }
.connection { position: absolute; top: 16px; right: 16px; padding: 4px 12px; border-radius: 12px; font-size: 0.8rem; }
.connection.connected { background: #1a7f37; }
.connection.disconnected { background: #da3633; }
.grid { display: grid; grid-template-columns: repeat(auto-fit, minmax(300px, 1fr)); gap: 20px; margin-bottom: 30px; }
.card { background: #161b22; border: 1px solid #30363d; border-radius: 12px; padding: 24px; }
.card h2 { font-size: 1.1rem; margin-bottom: 16px; }
.metric { text-align: center; margin: 16px 0; }
.metric-value { font-size: 2.5rem; font-weight: bold; }
.muted { color: #8b949e; font-size: 0.85rem; }
.progress { height: 8px; background: #30363d; border-radius: 4px; overflow: hidden; }
.progress-fill { height: 100%; width: 0%; background: #238636; transition: width 0.3s; }
.row { display: flex; justify-content: space-between; align-items: center; padding: 8px 0; border-bottom: 1px solid #21262d; }
.indicator { display: inline-block; width: 12px; height: 12px; border-radius: 50%; margin-right: 8px; background: #6e7681; }
.indicator.success { background: #238636; }
.indicator.failure { background: #da3633; }
.empty { text-align: center; color: #8b949e; padding: 20px; }
a { color: #58a6ff; text-decoration: none; }
"#;

const SCRIPT: &str = r#"
class PipelineMonitor {
  constructor(url) {
    this.url = url;
    this.ws = null;
    this.attempts = 0;
    this.pingTimer = null;
    this.connect();
  }

  connect() {
    try {
      this.ws = new WebSocket(this.url);
    } catch (e) {
      console.error('Failed to connect:', e);
      this.scheduleReconnect();
      return;
    }
    this.ws.onopen = () => {
      this.attempts = 0;
      this.setConnected(true);
      this.pingTimer = setInterval(() => this.send({ type: 'ping' }), PING_INTERVAL_MS);
    };
    this.ws.onmessage = (event) => {
      let message;
      try { message = JSON.parse(event.data); } catch (e) { return; }
      switch (message.type) {
        case 'initial_status':
        case 'status_update':
          this.render(message.data);
          break;
        case 'error':
          console.error('Server error:', message.message);
          break;
      }
    };
    this.ws.onclose = () => {
      clearInterval(this.pingTimer);
      this.setConnected(false);
      this.scheduleReconnect();
    };
    this.ws.onerror = () => this.setConnected(false);
  }

  send(message) {
    if (this.ws && this.ws.readyState === WebSocket.OPEN) this.ws.send(JSON.stringify(message));
  }

  scheduleReconnect() {
    const delay = Math.min(RECONNECT_BASE_MS * 2 ** this.attempts, RECONNECT_MAX_MS);
    this.attempts++;
    setTimeout(() => this.connect(), delay);
  }

  setConnected(connected) {
    const el = document.getElementById('connection');
    el.textContent = connected ? 'Connected' : 'Disconnected';
    el.className = 'connection ' + (connected ? 'connected' : 'disconnected');
  }

  text(id, value) { document.getElementById(id).textContent = value; }

  time(value) { return value ? new Date(value).toLocaleString() : 'Never'; }

  empty(list, label) {
    const div = document.createElement('div');
    div.className = 'empty';
    div.textContent = label;
    list.replaceChildren(div);
  }

  render(data) {
    const metrics = data.metrics || {};
    const rate = metrics.success_rate_percent || 0;
    this.text('successRate', metrics.total_runs ? rate.toFixed(1) + '%' : '--');
    document.getElementById('successProgress').style.width = rate + '%';
    this.text('totalRuns', metrics.total_runs || '--');
    this.text('avgDuration', metrics.avg_duration_seconds ? Math.round(metrics.avg_duration_seconds) + 's' : '--');
    this.text('lastSuccess', this.time(metrics.last_success_timestamp));
    this.text('lastFailure', this.time(metrics.last_failure_timestamp));

    const security = data.security_status || {};
    const labels = { CLEAN: ['success', 'Clean'], VULNERABILITIES_FOUND: ['failure', 'Issues found'], NO_SCAN: ['', 'No scan'] };
    const [cls, label] = labels[security.status] || ['', 'Unknown'];
    this.text('vulnerabilities', security.status === 'NO_SCAN' ? '--' : (security.total_vulnerabilities ?? '--'));
    document.getElementById('securityIndicator').className = 'indicator ' + cls;
    this.text('securityStatus', label);
    this.text('lastScan', this.time(security.last_scan_timestamp));

    const prs = data.open_dependency_prs || [];
    this.text('prCount', prs.length);
    const prList = document.getElementById('prList');
    if (prs.length === 0) {
      this.empty(prList, 'No open dependency PRs');
    } else {
      prList.replaceChildren(...prs.map((pr) => {
        const row = document.createElement('div');
        row.className = 'row';
        const link = document.createElement('a');
        link.href = pr.url;
        link.textContent = '#' + pr.number + ' ' + pr.title;
        const created = document.createElement('span');
        created.className = 'muted';
        created.textContent = pr.created_at ? new Date(pr.created_at).toLocaleDateString() : '';
        row.append(link, created);
        return row;
      }));
    }

    const workflows = Object.entries(data.workflows || {});
    const runList = document.getElementById('workflowRuns');
    if (workflows.length === 0) {
      this.empty(runList, 'No workflow data available');
    } else {
      runList.replaceChildren(...workflows.map(([name, workflow]) => {
        const latest = workflow.latest_run || {};
        const row = document.createElement('div');
        row.className = 'row';
        const title = document.createElement('div');
        const dot = document.createElement('span');
        dot.className = 'indicator ' + (latest.conclusion === 'success' ? 'success' : latest.conclusion === 'failure' ? 'failure' : '');
        title.append(dot, name + ' (' + Math.round(workflow.success_rate) + '% success)');
        const updated = document.createElement('span');
        updated.className = 'muted';
        updated.textContent = latest.updated_at ? new Date(latest.updated_at).toLocaleString() : 'Unknown';
        row.append(title, updated);
        return row;
      }));
    }

    this.text('lastUpdate', this.time(data.last_update));
  }
}

document.addEventListener('DOMContentLoaded', () => {
  const url = location.protocol.startsWith('http')
    ? (location.protocol === 'https:' ? 'wss://' : 'ws://') + location.host + '/ws'
    : FALLBACK_URL;
  new PipelineMonitor(url);
});
"#;

/// Render the dashboard page for a service listening on `port`.
pub fn render(port: u16) -> Markup {
    let constants = format!(
        "const FALLBACK_URL = 'ws://localhost:{port}/ws';\
         const RECONNECT_BASE_MS = {RECONNECT_BASE_MS};\
         const RECONNECT_MAX_MS = {RECONNECT_MAX_MS};\
         const PING_INTERVAL_MS = {PING_INTERVAL_MS};"
    );
    html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="utf-8";
                meta name="viewport" content="width=device-width, initial-scale=1.0";
                title { "Pipeline Monitor" }
                style { (PreEscaped(STYLE)) }
            }
            body {
                .container {
                    header {
                        h1 { "Pipeline Monitor" }
                        p { "Live CI pipeline status" }
                        #connection .connection.disconnected { "Disconnected" }
                    }
                    .grid {
                        .card {
                            h2 { "Pipeline health" }
                            .metric {
                                #successRate .metric-value { "--" }
                                .muted { "Success rate" }
                            }
                            .progress { #successProgress .progress-fill {} }
                            .row {
                                div { .muted { "Total runs" } #totalRuns { "--" } }
                                div { .muted { "Avg duration" } #avgDuration { "--" } }
                            }
                            .row {
                                div { .muted { "Last success" } #lastSuccess { "Never" } }
                                div { .muted { "Last failure" } #lastFailure { "Never" } }
                            }
                        }
                        .card {
                            h2 { "Security" }
                            .metric {
                                #vulnerabilities .metric-value { "--" }
                                .muted { "Vulnerabilities" }
                            }
                            .metric {
                                span #securityIndicator .indicator {}
                                span #securityStatus { "Unknown" }
                            }
                            .muted { "Last scan: " span #lastScan { "Never" } }
                        }
                        .card {
                            h2 { "Dependency PRs" }
                            .metric {
                                #prCount .metric-value { "--" }
                                .muted { "Open PRs" }
                            }
                            #prList { .empty { "Loading..." } }
                        }
                    }
                    .card {
                        h2 { "Recent workflow runs" }
                        #workflowRuns { .empty { "Loading workflow data..." } }
                    }
                    p .muted style="text-align: center; margin-top: 20px;" {
                        "Last updated: " span #lastUpdate { "Never" }
                    }
                }
                script { (PreEscaped(constants)) (PreEscaped(SCRIPT)) }
            }
        }
    }
}

pub async fn write(path: &Path, port: u16) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    tokio::fs::write(path, render(port).into_string())
        .await
        .with_context(|| format!("Failed to write {}", path.display()))
}
